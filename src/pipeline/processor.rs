//! 检测线程 (Pipeline consumer loop)
//! 职责: 从帧队列取帧 → 检测+跟踪 → 驻留计时 → 触发告警 → 渲染

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::channel::{FrameReceiver, Popped, RunFlag};
use super::ingestor::IngestorHandle;
use crate::alert::AlertDispatcher;
use crate::detection::{Detector, TrackId};
use crate::input::Frame;
use crate::renderer::Renderer;
use crate::tracking::{Clock, DwellStatus, DwellTracker, MonotonicClock, StatusMap};

/// 单帧处理结果
#[derive(Debug)]
pub enum FrameOutcome {
    /// 检测器没有返回结果, 跟踪状态未变
    Skipped,
    Processed {
        statuses: StatusMap,
        alerted: Vec<TrackId>, // 本帧新触发告警的ID
    },
}

/// 运行统计
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub alerts_dispatched: u64,
    pub empty_timeouts: u64,
    pub max_queue_latency: Duration, // 读出到开始处理的最长等待
}

pub struct Pipeline<D: Detector, R: Renderer, C: Clock = MonotonicClock> {
    detector: D,
    renderer: R,
    tracker: DwellTracker<C>,
    dispatcher: AlertDispatcher,
    receiver: FrameReceiver,
    running: RunFlag,
    pop_timeout: Duration,
    stats: PipelineStats,

    // 处理速度统计
    count: u64,
    last: Instant,
}

impl<D: Detector, R: Renderer, C: Clock> Pipeline<D, R, C> {
    pub fn new(
        detector: D,
        renderer: R,
        tracker: DwellTracker<C>,
        dispatcher: AlertDispatcher,
        receiver: FrameReceiver,
        running: RunFlag,
        pop_timeout: Duration,
    ) -> Self {
        Self {
            detector,
            renderer,
            tracker,
            dispatcher,
            receiver,
            running,
            pop_timeout,
            stats: PipelineStats::default(),
            count: 0,
            last: Instant::now(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn tracker(&self) -> &DwellTracker<C> {
        &self.tracker
    }

    /// 处理一帧
    ///
    /// 对每个首次进入 ALERT 的ID: 先标记已告警, 再同步分发告警。
    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        let latency = frame.captured_at.elapsed();
        if latency > self.stats.max_queue_latency {
            self.stats.max_queue_latency = latency;
        }

        let Some(detections) = self.detector.detect_and_track(frame) else {
            debug!("检测器未返回结果, 跳过帧 {}", frame.frame_id);
            self.stats.frames_skipped += 1;
            return FrameOutcome::Skipped;
        };

        let statuses = self.tracker.update(&detections.visible_ids());

        let mut alerted = Vec::new();
        for (&track_id, status) in &statuses {
            if status.status != DwellStatus::Alert || self.tracker.has_alerted(track_id) {
                continue;
            }
            // 先关闭去重窗口, 再做任何I/O
            self.tracker.mark_alerted(track_id);
            self.dispatcher.dispatch(frame, track_id, status.elapsed_secs());
            self.stats.alerts_dispatched += 1;
            alerted.push(track_id);
        }

        // 渲染结果只用于显示
        self.renderer.render(frame, &detections, &statuses);
        self.stats.frames_processed += 1;
        self.tick();

        FrameOutcome::Processed { statuses, alerted }
    }

    fn tick(&mut self) {
        self.count += 1;
        let elapsed = self.last.elapsed();
        if elapsed >= Duration::from_secs(5) {
            let fps = self.count as f64 / elapsed.as_secs_f64();
            info!(
                "📊 处理速度: {:.1} FPS | 跟踪中 {} 个目标",
                fps,
                self.tracker.track_count()
            );
            self.count = 0;
            self.last = Instant::now();
        }
    }

    /// 消费循环, 直到运行标志被清除、队列关闭, 或采集线程退出后取帧超时
    pub fn run(&mut self, producer: &IngestorHandle) -> PipelineStats {
        info!("🔍 检测线程启动");

        while self.running.is_running() {
            match self.receiver.pop(self.pop_timeout) {
                Popped::Frame(frame) => {
                    self.process_frame(&frame);
                }
                Popped::Empty => {
                    self.stats.empty_timeouts += 1;
                    if producer.is_finished() {
                        warn!("⚠️  采集线程已退出且 {:?} 内无新帧, 停止处理", self.pop_timeout);
                        self.running.stop();
                        break;
                    }
                    warn!("⚠️  {:?} 内没有新帧, 视频流可能卡顿, 继续等待", self.pop_timeout);
                }
                Popped::Closed => {
                    info!("✅ 帧队列已关闭且取空, 停止处理");
                    self.running.stop();
                    break;
                }
            }
        }

        info!(
            "🛑 检测线程退出: 处理 {} 帧, 跳过 {} 帧, 告警 {} 次, 取帧超时 {} 次, 最大排队 {:?}",
            self.stats.frames_processed,
            self.stats.frames_skipped,
            self.stats.alerts_dispatched,
            self.stats.empty_timeouts,
            self.stats.max_queue_latency
        );
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertNotice, AlertNotifier, NotifyReceipt, SnapshotStore};
    use crate::config::DwellConfig;
    use crate::detection::{BBox, Detections};
    use crate::error::Result;
    use crate::pipeline::channel::FrameChannel;
    use crate::renderer::NullRenderer;
    use crate::tracking::ManualClock;
    use image::RgbImage;
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 按帧序号给出脚本化的检测结果
    struct ScriptedDetector {
        script: Vec<Option<Vec<TrackId>>>,
    }

    impl Detector for ScriptedDetector {
        fn detect_and_track(&mut self, frame: &Frame) -> Option<Detections> {
            let ids = self.script.get(frame.frame_id as usize)?.clone()?;
            let boxes = ids.iter().map(|_| BBox::new(0.0, 0.0, 1.0, 1.0)).collect();
            Detections::tracked(boxes, ids).ok()
        }
    }

    struct PathStore;

    impl SnapshotStore for PathStore {
        fn persist(&self, _image: &RgbImage, name: &str) -> Result<PathBuf> {
            Ok(PathBuf::from(name))
        }
    }

    struct CountingNotifier(Arc<AtomicUsize>);

    impl AlertNotifier for CountingNotifier {
        fn notify(&self, _notice: &AlertNotice) -> Result<NotifyReceipt> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(NotifyReceipt {
                status: 200,
                body: String::new(),
            })
        }
    }

    /// 记录渲染调用次数
    struct CountingRenderer(Rc<Cell<usize>>);

    impl Renderer for CountingRenderer {
        fn render(&mut self, frame: &Frame, _d: &Detections, _s: &StatusMap) -> RgbImage {
            self.0.set(self.0.get() + 1);
            frame.image.clone()
        }
    }

    fn pipeline<R: Renderer>(
        script: Vec<Option<Vec<TrackId>>>,
        renderer: R,
    ) -> (Pipeline<ScriptedDetector, R, ManualClock>, ManualClock, Arc<AtomicUsize>) {
        let clock = ManualClock::new();
        let notified = Arc::new(AtomicUsize::new(0));
        let dispatcher = AlertDispatcher::new(
            Box::new(PathStore),
            Box::new(CountingNotifier(Arc::clone(&notified))),
            "id",
            "test",
        );
        let (_tx, rx) = FrameChannel::bounded(2, Duration::from_millis(5));
        let pipeline = Pipeline::new(
            ScriptedDetector { script },
            renderer,
            DwellTracker::with_clock(DwellConfig::default(), clock.clone()),
            dispatcher,
            rx,
            RunFlag::new(),
            Duration::from_millis(20),
        );
        (pipeline, clock, notified)
    }

    fn frame(id: u64) -> Frame {
        Frame::new(RgbImage::new(2, 2), id)
    }

    #[test]
    fn test_skipped_frame_leaves_state_untouched() {
        let (mut pipeline, clock, _) = pipeline(vec![Some(vec![1]), None, Some(vec![1])], NullRenderer);
        pipeline.process_frame(&frame(0));
        clock.advance(Duration::from_millis(300));
        assert!(matches!(pipeline.process_frame(&frame(1)), FrameOutcome::Skipped));
        assert!(pipeline.tracker().is_tracking(1));

        match pipeline.process_frame(&frame(2)) {
            FrameOutcome::Processed { statuses, .. } => {
                assert_eq!(statuses[&1].elapsed, Duration::from_millis(300));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pipeline.stats().frames_skipped, 1);
        assert_eq!(pipeline.stats().frames_processed, 2);
    }

    #[test]
    fn test_alert_dispatched_once_per_track() {
        let script = (0..10).map(|_| Some(vec![3, 4])).collect();
        let (mut pipeline, clock, notified) = pipeline(script, NullRenderer);

        let mut alert_frames = Vec::new();
        for id in 0..10 {
            if let FrameOutcome::Processed { alerted, .. } = pipeline.process_frame(&frame(id)) {
                if !alerted.is_empty() {
                    alert_frames.push((id, alerted));
                }
            }
            clock.advance(Duration::from_millis(300));
        }

        // 第4帧时长 1.2s, 首次超过 1.0s
        assert_eq!(alert_frames, vec![(4, vec![3, 4])]);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert!(pipeline.tracker().has_alerted(3));
        assert_eq!(pipeline.stats().alerts_dispatched, 2);
    }

    #[test]
    fn test_every_processed_frame_is_rendered() {
        let rendered = Rc::new(Cell::new(0));
        let script = vec![Some(vec![]), None, Some(vec![9])];
        let (mut pipeline, _clock, _) = pipeline(script, CountingRenderer(Rc::clone(&rendered)));
        for id in 0..3 {
            pipeline.process_frame(&frame(id));
        }
        assert_eq!(rendered.get(), 2);
    }

    #[test]
    fn test_queue_latency_measured_from_capture() {
        let (mut pipeline, _clock, _) = pipeline(vec![Some(vec![]), Some(vec![])], NullRenderer);
        let mut waited = frame(0);
        waited.captured_at = Instant::now() - Duration::from_millis(80);
        pipeline.process_frame(&waited);
        pipeline.process_frame(&frame(1));
        assert!(pipeline.stats().max_queue_latency >= Duration::from_millis(80));
    }
}
