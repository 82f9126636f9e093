//! 告警分发: 保存截图 → 推送接口
//! 任何失败只记录日志, 不向检测线程传播

use chrono::Local;
use log::{error, info, warn};

use super::notifier::{AlertNotice, AlertNotifier};
use super::snapshot::{snapshot_name, SnapshotStore};
use crate::detection::TrackId;
use crate::error::Error;
use crate::input::Frame;

/// 单次分发的结果
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// 截图已保存且接口返回2xx
    Delivered { status: u16 },
    /// 截图已保存, 但推送失败
    NotifyFailed,
    /// 截图保存失败, 未推送
    SnapshotFailed,
}

pub struct AlertDispatcher {
    store: Box<dyn SnapshotStore + Send>,
    notifier: Box<dyn AlertNotifier + Send>,
    alert_id: String,
    source_label: String,
}

impl AlertDispatcher {
    pub fn new(
        store: Box<dyn SnapshotStore + Send>,
        notifier: Box<dyn AlertNotifier + Send>,
        alert_id: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            alert_id: alert_id.into(),
            source_label: source_label.into(),
        }
    }

    /// 为一个跟踪ID发出告警 (每个ID每次驻留最多调用一次)
    pub fn dispatch(&self, frame: &Frame, track_id: TrackId, elapsed_secs: f64) -> DispatchOutcome {
        warn!(
            "🚨 驻留告警: 跟踪ID {} 已停留 {:.1}s (帧 {})",
            track_id, elapsed_secs, frame.frame_id
        );

        let time = Local::now();
        let name = snapshot_name(track_id, &time);
        let image_path = match self.store.persist(&frame.image, &name) {
            Ok(path) => {
                info!("📸 告警截图已保存: {}", path.display());
                path
            }
            Err(e) => {
                error!("❌ 跟踪ID {} 截图保存失败, 跳过推送: {}", track_id, e);
                return DispatchOutcome::SnapshotFailed;
            }
        };

        let notice = AlertNotice {
            alert_id: self.alert_id.clone(),
            track_id,
            elapsed_secs,
            time,
            source_label: self.source_label.clone(),
            image_path,
        };

        info!("📤 推送告警: 跟踪ID {} → {}", track_id, notice.image_path.display());
        match self.notifier.notify(&notice) {
            Ok(receipt) => {
                info!(
                    "✅ 告警已推送: 跟踪ID {} (HTTP {}) 响应: {}",
                    track_id, receipt.status, receipt.body
                );
                DispatchOutcome::Delivered {
                    status: receipt.status,
                }
            }
            Err(Error::AlertRejected { status, body }) => {
                warn!(
                    "⚠️  告警接口拒绝: 跟踪ID {} HTTP {} 响应: {}",
                    track_id, status, body
                );
                DispatchOutcome::NotifyFailed
            }
            Err(e) => {
                error!("❌ 告警推送失败: 跟踪ID {}: {}", track_id, e);
                DispatchOutcome::NotifyFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::notifier::NotifyReceipt;
    use crate::error::Result;
    use image::RgbImage;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    struct FakeStore {
        fail: bool,
        names: Arc<Mutex<Vec<String>>>,
    }

    impl SnapshotStore for FakeStore {
        fn persist(&self, _image: &RgbImage, name: &str) -> Result<PathBuf> {
            if self.fail {
                return Err(Error::Snapshot {
                    path: PathBuf::from("/nowhere"),
                    reason: "disk full".to_string(),
                });
            }
            self.names.lock().unwrap().push(name.to_string());
            Ok(PathBuf::from(format!("/snapshots/{}.jpg", name)))
        }
    }

    struct FakeNotifier {
        status: u16,
        notices: Arc<Mutex<Vec<AlertNotice>>>,
    }

    impl AlertNotifier for FakeNotifier {
        fn notify(&self, notice: &AlertNotice) -> Result<NotifyReceipt> {
            self.notices.lock().unwrap().push(notice.clone());
            if (200..300).contains(&self.status) {
                Ok(NotifyReceipt {
                    status: self.status,
                    body: String::new(),
                })
            } else {
                Err(Error::AlertRejected {
                    status: self.status,
                    body: "nope".to_string(),
                })
            }
        }
    }

    fn dispatcher(
        fail_store: bool,
        status: u16,
    ) -> (AlertDispatcher, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<AlertNotice>>>) {
        let names = Arc::new(Mutex::new(Vec::new()));
        let notices = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::new(
            Box::new(FakeStore {
                fail: fail_store,
                names: Arc::clone(&names),
            }),
            Box::new(FakeNotifier {
                status,
                notices: Arc::clone(&notices),
            }),
            "alert-1",
            "cam-east",
        );
        (dispatcher, names, notices)
    }

    #[test]
    fn test_dispatch_delivers() {
        let (dispatcher, names, notices) = dispatcher(false, 200);
        let frame = Frame::new(RgbImage::new(4, 4), 9);

        let outcome = dispatcher.dispatch(&frame, 5, 1.23);
        assert_eq!(outcome, DispatchOutcome::Delivered { status: 200 });

        let names = names.lock().unwrap();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("alert_track_5_"));

        let notices = notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].alert_id, "alert-1");
        assert_eq!(notices[0].track_id, 5);
        assert_eq!(notices[0].source_label, "cam-east");
        assert_eq!(
            notices[0].image_path,
            PathBuf::from(format!("/snapshots/{}.jpg", names[0]))
        );
    }

    #[test]
    fn test_snapshot_failure_skips_notify() {
        let (dispatcher, _names, notices) = dispatcher(true, 200);
        let frame = Frame::new(RgbImage::new(4, 4), 0);
        assert_eq!(
            dispatcher.dispatch(&frame, 1, 2.0),
            DispatchOutcome::SnapshotFailed
        );
        assert!(notices.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rejected_notify_is_contained() {
        let (dispatcher, names, notices) = dispatcher(false, 503);
        let frame = Frame::new(RgbImage::new(4, 4), 0);
        assert_eq!(
            dispatcher.dispatch(&frame, 1, 2.0),
            DispatchOutcome::NotifyFailed
        );
        assert_eq!(names.lock().unwrap().len(), 1);
        assert_eq!(notices.lock().unwrap().len(), 1);
    }
}
