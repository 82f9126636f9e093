/// 渲染系统 (Renderer)
/// 职责: 在帧上叠加检测框与驻留状态标签, 可选输出最新标注帧
use std::fs;
use std::path::PathBuf;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{info, warn};

use crate::config::RenderConfig;
use crate::detection::{BBox, Detections, TrackId};
use crate::input::Frame;
use crate::tracking::{DwellStatus, StatusMap, TrackStatus};

pub const COLOR_TRACKING: Rgb<u8> = Rgb([0, 255, 0]); // 绿色: 新目标/跟踪中
pub const COLOR_WARN: Rgb<u8> = Rgb([255, 165, 0]); // 橙色: 预警
pub const COLOR_ALERT: Rgb<u8> = Rgb([255, 0, 0]); // 红色: 驻留告警
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 18.0;

/// 渲染接口: 输出标注后的帧, 不修改核心状态
pub trait Renderer {
    fn render(&mut self, frame: &Frame, detections: &Detections, statuses: &StatusMap) -> RgbImage;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, frame: &Frame, detections: &Detections, statuses: &StatusMap) -> RgbImage {
        (**self).render(frame, detections, statuses)
    }
}

/// 不做任何标注
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, frame: &Frame, _detections: &Detections, _statuses: &StatusMap) -> RgbImage {
        frame.image.clone()
    }
}

pub fn status_color(status: DwellStatus) -> Rgb<u8> {
    match status {
        DwellStatus::New | DwellStatus::Tracking => COLOR_TRACKING,
        DwellStatus::Warn => COLOR_WARN,
        DwellStatus::Alert => COLOR_ALERT,
    }
}

pub fn status_label(track_id: TrackId, status: &TrackStatus) -> String {
    match status.status {
        DwellStatus::Alert => format!("ID: {} (LOITERING: {:.1}s)", track_id, status.elapsed_secs()),
        _ => format!("ID: {} ({:.1}s)", track_id, status.elapsed_secs()),
    }
}

/// 框画在图像范围内; 完全在图外时返回 None
fn clamp_rect(bbox: &BBox, width: u32, height: u32) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    if bbox.x1.max(bbox.x2) < 0.0 || bbox.y1.max(bbox.y2) < 0.0 {
        return None;
    }
    if bbox.x1.min(bbox.x2) > max_x || bbox.y1.min(bbox.y2) > max_y {
        return None;
    }
    let x1 = bbox.x1.min(bbox.x2).clamp(0.0, max_x) as i32;
    let y1 = bbox.y1.min(bbox.y2).clamp(0.0, max_y) as i32;
    let x2 = bbox.x1.max(bbox.x2).clamp(0.0, max_x) as i32;
    let y2 = bbox.y1.max(bbox.y2).clamp(0.0, max_y) as i32;
    let w = (x2 - x1 + 1).max(1) as u32;
    let h = (y2 - y1 + 1).max(1) as u32;
    Some(Rect::at(x1, y1).of_size(w, h))
}

/// 检测框 + 状态标签叠加
pub struct OverlayRenderer {
    font: Option<FontVec>,
    preview_path: Option<PathBuf>,
}

impl OverlayRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let font = config.font_path.as_ref().and_then(|path| match fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    info!("✅ 标签字体已加载: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️  字体解析失败 {}: {}, 只绘制检测框", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("⚠️  未找到字体文件 {}: {}, 只绘制检测框", path.display(), e);
                None
            }
        });

        Self {
            font,
            preview_path: config.preview_path.clone(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_box(canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
        draw_hollow_rect_mut(canvas, rect, color);
        // 内缩一像素再画一次, 线宽 2px
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left() + 1, rect.top() + 1)
                .of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(canvas, inner, color);
        }
    }

    fn draw_label(font: &FontVec, canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>, text: &str) {
        let scale = PxScale::from(LABEL_SCALE);
        let (text_w, text_h) = text_size(scale, font, text);
        let bg_h = text_h + 4;
        // 优先放在框上方, 空间不够则放在框内
        let y = if rect.top() >= bg_h as i32 {
            rect.top() - bg_h as i32
        } else {
            rect.top()
        };
        draw_filled_rect_mut(canvas, Rect::at(rect.left(), y).of_size(text_w + 4, bg_h), color);
        draw_text_mut(canvas, LABEL_TEXT, rect.left() + 2, y + 2, scale, font, text);
    }

    fn write_preview(&self, canvas: &RgbImage) {
        if let Some(path) = &self.preview_path {
            if let Err(e) = canvas.save(path) {
                warn!("⚠️  预览帧写出失败 {}: {}", path.display(), e);
            }
        }
    }
}

impl Renderer for OverlayRenderer {
    fn render(&mut self, frame: &Frame, detections: &Detections, statuses: &StatusMap) -> RgbImage {
        let mut canvas = frame.image.clone();
        let (width, height) = canvas.dimensions();

        for detection in detections.iter() {
            let Some(status) = statuses.get(&detection.track_id) else {
                continue;
            };
            let Some(rect) = clamp_rect(&detection.bbox, width, height) else {
                continue;
            };
            let color = status_color(status.status);
            Self::draw_box(&mut canvas, rect, color);
            if let Some(font) = &self.font {
                let label = status_label(detection.track_id, status);
                Self::draw_label(font, &mut canvas, rect, color, &label);
            }
        }

        self.write_preview(&canvas);
        canvas
    }
}
