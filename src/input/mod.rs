/// 视频输入系统 (Video Input System)
///
/// 采集线程的数据来源, 负责按需读出帧
/// - Frame:          已解码帧 (单一所有者)
/// - FrameSource:    视频源接口
/// - ImageDirSource: 图片序列回放
/// - FfmpegSource:   视频文件/RTSP/摄像头解码 (需启用 `ffmpeg` 特性)
pub mod frame;
pub mod source;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use frame::Frame;
pub use source::{FrameSource, ImageDirSource};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;
