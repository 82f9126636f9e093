/// 视频帧 (采集线程 → 帧队列 → 检测线程)
/// Owned video frame moving through the pipeline
use std::time::Instant;

use image::RgbImage;

/// 已解码帧
///
/// 任意时刻只有一个所有者: 采集线程读出后移入队列, 再由检测线程取出。
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub frame_id: u64,         // 帧序号 (从0开始)
    pub captured_at: Instant,  // 读出时刻
}

impl Frame {
    pub fn new(image: RgbImage, frame_id: u64) -> Self {
        Self {
            image,
            frame_id,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 由RGB24紧凑数据构造 (长度须为 width × height × 3)
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>, frame_id: u64) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self::new(image, frame_id))
    }
}
