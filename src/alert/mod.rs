/// 告警系统 (Alert System)
/// 职责: 保存告警截图 + 推送到远程告警接口, 失败不影响检测线程
pub mod dispatcher;
pub mod notifier;
pub mod snapshot;

pub use dispatcher::{AlertDispatcher, DispatchOutcome};
pub use notifier::{AlertNotice, AlertNotifier, HttpAlertNotifier, MultipartForm, NotifyReceipt};
pub use snapshot::{snapshot_name, JpegSnapshotStore, SnapshotStore};
