/// 视频源接口与图片序列输入
/// Frame source capability and still-image sequence input
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info};

use super::frame::Frame;
use crate::error::{Error, Result};

/// 视频源: 按需读出一帧
///
/// - `Ok(Some(frame))`: 读到新帧
/// - `Ok(None)`: 流结束
/// - `Err(_)`: 读帧失败 (对流水线是致命的, 不重试)
///
/// 底层句柄在 `Drop` 时释放。
pub trait FrameSource: Send {
    /// 视频源名称 (用于日志和告警描述)
    fn label(&self) -> &str;

    fn read(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        (**self).read()
    }
}

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 图片序列视频源: 目录内图片按文件名排序逐帧回放
pub struct ImageDirSource {
    label: String,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_interval: Option<Duration>, // 回放帧间隔 (None = 尽快读出)
    next_due: Option<Instant>,
}

impl ImageDirSource {
    pub fn open(dir: impl AsRef<Path>, frame_rate: Option<f64>) -> Result<Self> {
        let dir = dir.as_ref();
        let label = dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|e| Error::StreamOpen {
            source_label: label.clone(),
            reason: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::StreamOpen {
                source_label: label,
                reason: "目录中没有图片帧".to_string(),
            });
        }

        info!("📂 图片序列: {} 帧 ({})", files.len(), label);

        Ok(Self {
            label,
            files,
            cursor: 0,
            frame_interval: frame_rate.map(|fps| Duration::from_secs_f64(1.0 / fps)),
            next_due: None,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn pace(&mut self) {
        let Some(interval) = self.frame_interval else {
            return;
        };
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.unwrap_or(now).max(now) + interval);
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };

        let image = image::open(path)
            .map_err(|e| Error::StreamRead(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        debug!("读出帧 #{}: {}", self.cursor, path.display());

        let frame = Frame::new(image, self.cursor as u64);
        self.cursor += 1;
        self.pace();
        Ok(Some(frame))
    }
}
