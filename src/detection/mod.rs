/// 检测系统 (Detection System)
///
/// 外部检测/跟踪能力的接口与数据结构
/// - Detector:       检测+跟踪接口
/// - ReplayDetector: 离线检测记录回放
pub mod detector;
pub mod replay;
pub mod types;

pub use detector::Detector;
pub use replay::ReplayDetector;
pub use types::{BBox, Detection, Detections, TrackId};
