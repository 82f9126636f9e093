//! 驻留计时状态机 (Dwell Tracker)
//! 职责: 记录每个跟踪ID的首次出现时刻, 计算驻留时长与状态, 维护告警去重集合
//!
//! 跟踪表只由 `DwellTracker` 持有和修改, 外部只能通过 `update` / `mark_alerted` 改变它。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use log::info;

use super::clock::{Clock, MonotonicClock};
use crate::config::DwellConfig;
use crate::detection::TrackId;

/// 驻留状态 (每轮由驻留时长重新计算, 不存储)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DwellStatus {
    New,      // 本轮首次出现
    Tracking, // 0 < 时长 ≤ 预警阈值
    Warn,     // 预警阈值 < 时长 ≤ 告警阈值
    Alert,    // 时长 > 告警阈值
}

impl DwellStatus {
    /// 已存在跟踪的状态判定 (阈值边界取严格大于)
    pub fn classify(elapsed_secs: f64, config: &DwellConfig) -> Self {
        if elapsed_secs > config.alert_threshold_secs {
            DwellStatus::Alert
        } else if elapsed_secs > config.warn_threshold_secs() {
            DwellStatus::Warn
        } else {
            DwellStatus::Tracking
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DwellStatus::New => "new",
            DwellStatus::Tracking => "tracking",
            DwellStatus::Warn => "warn",
            DwellStatus::Alert => "alert",
        }
    }
}

impl fmt::Display for DwellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个跟踪ID本轮的驻留结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackStatus {
    pub elapsed: Duration,
    pub status: DwellStatus,
}

impl TrackStatus {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// 本轮状态表 (按ID排序), 每轮重新计算, 不要跨轮保存
pub type StatusMap = BTreeMap<TrackId, TrackStatus>;

#[derive(Clone, Copy, Debug)]
struct TrackEntry {
    start: Instant,
}

pub struct DwellTracker<C: Clock = MonotonicClock> {
    config: DwellConfig,
    clock: C,
    entries: HashMap<TrackId, TrackEntry>,
    alerted: HashSet<TrackId>, // 已告警ID (去重)
}

impl<C: Clock> DwellTracker<C> {
    pub fn with_clock(config: DwellConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            entries: HashMap::new(),
            alerted: HashSet::new(),
        }
    }

    /// 用本帧可见ID更新所有计时
    ///
    /// 1. 消失的ID: 删除计时并清除去重标记 (再次出现时重新开始)
    /// 2. 新ID: 以当前时刻开始计时, 状态 NEW, 时长 0
    /// 3. 已有ID: 按时长判定 TRACKING / WARN / ALERT
    pub fn update(&mut self, visible_ids: &[TrackId]) -> StatusMap {
        let now = self.clock.now();
        let seen: HashSet<TrackId> = visible_ids.iter().copied().collect();

        let disappeared: Vec<TrackId> = self
            .entries
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        for track_id in disappeared {
            info!("👋 跟踪ID {} 已消失", track_id);
            self.entries.remove(&track_id);
            self.alerted.remove(&track_id);
        }

        let mut statuses = StatusMap::new();
        for &track_id in visible_ids {
            // 同一帧重复出现的ID只计一次
            if statuses.contains_key(&track_id) {
                continue;
            }

            let status = match self.entries.get(&track_id) {
                None => {
                    info!("🆕 新跟踪ID {} 出现", track_id);
                    self.entries.insert(track_id, TrackEntry { start: now });
                    TrackStatus {
                        elapsed: Duration::ZERO,
                        status: DwellStatus::New,
                    }
                }
                Some(entry) => {
                    let elapsed = now.saturating_duration_since(entry.start);
                    TrackStatus {
                        elapsed,
                        status: DwellStatus::classify(elapsed.as_secs_f64(), &self.config),
                    }
                }
            };
            statuses.insert(track_id, status);
        }

        statuses
    }

    pub fn has_alerted(&self, track_id: TrackId) -> bool {
        self.alerted.contains(&track_id)
    }

    /// 标记已告警, 重复调用无副作用; 首次标记返回 true
    pub fn mark_alerted(&mut self, track_id: TrackId) -> bool {
        let inserted = self.alerted.insert(track_id);
        if inserted {
            info!("🔕 跟踪ID {} 已标记为已告警", track_id);
        }
        inserted
    }

    pub fn is_tracking(&self, track_id: TrackId) -> bool {
        self.entries.contains_key(&track_id)
    }

    /// 当前跟踪数量
    pub fn track_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ManualClock;

    fn config() -> DwellConfig {
        DwellConfig {
            alert_threshold_secs: 1.0,
            warn_fraction: 0.6,
        }
    }

    fn tracker() -> (DwellTracker<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (DwellTracker::with_clock(config(), clock.clone()), clock)
    }

    fn status_after(millis: u64) -> DwellStatus {
        let (mut tracker, clock) = tracker();
        assert_eq!(tracker.update(&[1])[&1].status, DwellStatus::New);
        clock.advance(Duration::from_millis(millis));
        tracker.update(&[1])[&1].status
    }

    #[test]
    fn test_boundary_classification() {
        assert_eq!(status_after(590), DwellStatus::Tracking);
        assert_eq!(status_after(600), DwellStatus::Tracking);
        assert_eq!(status_after(610), DwellStatus::Warn);
        assert_eq!(status_after(1000), DwellStatus::Warn);
        assert_eq!(status_after(1010), DwellStatus::Alert);
    }

    #[test]
    fn test_classify_pure() {
        let config = config();
        assert_eq!(DwellStatus::classify(0.0, &config), DwellStatus::Tracking);
        assert_eq!(DwellStatus::classify(0.59, &config), DwellStatus::Tracking);
        assert_eq!(DwellStatus::classify(0.61, &config), DwellStatus::Warn);
        assert_eq!(DwellStatus::classify(1.01, &config), DwellStatus::Alert);
    }

    #[test]
    fn test_new_track_starts_at_zero() {
        let (mut tracker, _clock) = tracker();
        let statuses = tracker.update(&[4, 5]);
        assert_eq!(statuses.len(), 2);
        for status in statuses.values() {
            assert_eq!(status.status, DwellStatus::New);
            assert_eq!(status.elapsed, Duration::ZERO);
        }
        assert_eq!(tracker.track_count(), 2);
    }

    #[test]
    fn test_elapsed_is_monotonic_while_visible() {
        let (mut tracker, clock) = tracker();
        let mut last = Duration::ZERO;
        for step in [0u64, 30, 0, 120, 5, 900] {
            clock.advance(Duration::from_millis(step));
            let elapsed = tracker.update(&[8])[&8].elapsed;
            assert!(elapsed >= last);
            last = elapsed;
        }
        assert_eq!(last, Duration::from_millis(1055));
    }

    #[test]
    fn test_entries_follow_latest_visible_set() {
        let (mut tracker, _clock) = tracker();
        tracker.update(&[1, 2, 3]);
        tracker.update(&[2]);
        assert!(!tracker.is_tracking(1));
        assert!(tracker.is_tracking(2));
        assert!(!tracker.is_tracking(3));
        assert_eq!(tracker.track_count(), 1);

        let statuses = tracker.update(&[]);
        assert!(statuses.is_empty());
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn test_reset_on_disappearance() {
        let (mut tracker, clock) = tracker();
        tracker.update(&[7]);
        clock.advance(Duration::from_millis(1500));
        assert_eq!(tracker.update(&[7])[&7].status, DwellStatus::Alert);
        assert!(tracker.mark_alerted(7));
        assert!(tracker.has_alerted(7));

        clock.advance(Duration::from_millis(100));
        tracker.update(&[]);
        assert!(!tracker.has_alerted(7));

        clock.advance(Duration::from_millis(100));
        let status = tracker.update(&[7])[&7];
        assert_eq!(status.status, DwellStatus::New);
        assert_eq!(status.elapsed, Duration::ZERO);
        assert!(!tracker.has_alerted(7));
    }

    #[test]
    fn test_mark_alerted_idempotent() {
        let (mut tracker, _clock) = tracker();
        tracker.update(&[3]);
        assert!(tracker.mark_alerted(3));
        assert!(!tracker.mark_alerted(3));
        assert!(tracker.has_alerted(3));
        assert!(!tracker.has_alerted(4));
    }

    #[test]
    fn test_duplicate_ids_in_one_frame() {
        let (mut tracker, clock) = tracker();
        let statuses = tracker.update(&[2, 2]);
        assert_eq!(statuses[&2].status, DwellStatus::New);

        clock.advance(Duration::from_millis(200));
        let statuses = tracker.update(&[2, 2]);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[&2].elapsed, Duration::from_millis(200));
    }
}
