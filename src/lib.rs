// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod alert; // 告警系统
pub mod config; // 系统配置
pub mod detection; // 检测接口
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod pipeline; // 处理流水线
pub mod renderer; // 画面标注
pub mod tracking; // 驻留跟踪系统

pub use crate::alert::{AlertDispatcher, HttpAlertNotifier, JpegSnapshotStore};
pub use crate::config::Config;
pub use crate::detection::{BBox, Detections, Detector, ReplayDetector, TrackId};
pub use crate::error::{Error, Result};
pub use crate::input::{Frame, FrameSource, ImageDirSource};
pub use crate::pipeline::{Sentinel, SentinelReport};
pub use crate::renderer::{NullRenderer, OverlayRenderer, Renderer};
pub use crate::tracking::{DwellStatus, DwellTracker, MonotonicClock};
