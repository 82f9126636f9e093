/// 驻留跟踪系统 (Dwell Tracking System)
///
/// - Clock:        单调时间源
/// - DwellTracker: 每个跟踪ID的驻留计时与告警去重
pub mod clock;
pub mod dwell;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dwell::{DwellStatus, DwellTracker, StatusMap, TrackStatus};
