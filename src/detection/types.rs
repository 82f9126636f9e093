/// 检测系统数据结构定义
/// Data structures produced by the detector capability
use crate::error::{Error, Result};

/// 跟踪ID (由外部检测/跟踪器分配, 同一目标跨帧保持不变)
pub type TrackId = u32;

/// 检测框 (左上/右下角坐标, 像素)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

impl From<[f32; 4]> for BBox {
    fn from(xyxy: [f32; 4]) -> Self {
        Self::new(xyxy[0], xyxy[1], xyxy[2], xyxy[3])
    }
}

/// 单个带跟踪ID的检测结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub track_id: TrackId,
}

/// 一帧的检测结果 (已过滤为关注类别)
///
/// `track_ids` 为 `None` 表示检测到目标但跟踪器尚未分配ID, 此时没有可见ID。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detections {
    boxes: Vec<BBox>,
    track_ids: Option<Vec<TrackId>>,
}

impl Detections {
    /// 空结果 (本帧无目标)
    pub fn empty() -> Self {
        Self::default()
    }

    /// 由平行的框序列和ID序列构造, 两者长度必须一致
    pub fn tracked(boxes: Vec<BBox>, track_ids: Vec<TrackId>) -> Result<Self> {
        if boxes.len() != track_ids.len() {
            return Err(Error::MismatchedDetections {
                boxes: boxes.len(),
                ids: track_ids.len(),
            });
        }
        Ok(Self {
            boxes,
            track_ids: Some(track_ids),
        })
    }

    /// 只有框没有跟踪ID
    pub fn untracked(boxes: Vec<BBox>) -> Self {
        Self {
            boxes,
            track_ids: None,
        }
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn track_ids(&self) -> Option<&[TrackId]> {
        self.track_ids.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// 当前帧可见的跟踪ID
    pub fn visible_ids(&self) -> Vec<TrackId> {
        self.track_ids.clone().unwrap_or_default()
    }

    /// 按 (框, ID) 成对遍历; 无ID时为空
    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        self.track_ids
            .iter()
            .flat_map(move |ids| self.boxes.iter().zip(ids.iter()))
            .map(|(bbox, id)| Detection {
                bbox: *bbox,
                track_id: *id,
            })
    }
}
