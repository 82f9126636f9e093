//! 采集线程 (Ingestor)
//! 职责: 从视频源逐帧读出 → 送入帧队列, 直到流结束/读帧失败/收到停止信号

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use super::channel::{FrameSender, PushError, RunFlag};
use crate::input::FrameSource;

/// 采集线程退出原因
#[derive(Clone, Debug, PartialEq)]
pub enum IngestExit {
    /// 视频流正常结束
    EndOfStream,
    /// 读帧失败
    ReadFailed(String),
    /// 运行标志被清除
    Stopped,
    /// 消费端已释放帧队列
    ConsumerGone,
}

#[derive(Clone, Debug)]
pub struct IngestReport {
    pub frames_read: u64,
    pub exit: IngestExit,
}

pub struct Ingestor<S: FrameSource> {
    source: S,
    sender: FrameSender,
    running: RunFlag,
}

impl<S: FrameSource + 'static> Ingestor<S> {
    pub fn new(source: S, sender: FrameSender, running: RunFlag) -> Self {
        Self {
            source,
            sender,
            running,
        }
    }

    /// 启动采集线程
    pub fn spawn(self) -> std::io::Result<IngestorHandle> {
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);
        let join = thread::Builder::new()
            .name("ingestor".to_string())
            .spawn(move || {
                let report = self.run();
                done.store(true, Ordering::SeqCst);
                report
            })?;
        Ok(IngestorHandle {
            join: Some(join),
            finished,
        })
    }

    /// 采集循环; 结束时释放视频源和帧队列发送端
    pub fn run(mut self) -> IngestReport {
        info!("🎬 采集线程启动: {}", self.source.label());
        let mut frames_read = 0u64;

        let exit = loop {
            if !self.running.is_running() {
                break IngestExit::Stopped;
            }

            let frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    warn!("⚠️  视频流结束");
                    break IngestExit::EndOfStream;
                }
                Err(e) => {
                    error!("❌ 读帧失败: {}", e);
                    // 致命错误: 立即停止整个流水线
                    self.running.stop();
                    break IngestExit::ReadFailed(e.to_string());
                }
            };
            frames_read += 1;

            match self.sender.push(frame, &self.running) {
                Ok(()) => {}
                Err(PushError::Stopped(_)) => break IngestExit::Stopped,
                Err(PushError::Closed(_)) => break IngestExit::ConsumerGone,
            }
        };

        info!("🛑 采集线程退出: 读出 {} 帧 ({:?})", frames_read, exit);
        IngestReport { frames_read, exit }
    }
}

/// 采集线程句柄
pub struct IngestorHandle {
    join: Option<JoinHandle<IngestReport>>,
    finished: Arc<AtomicBool>,
}

impl IngestorHandle {
    /// 采集线程是否已经退出 (含异常退出)
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
            || self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// 有限时间内等待采集线程退出; 超时则分离线程并返回 `None`
    pub fn join_timeout(&mut self, timeout: Duration) -> Option<IngestReport> {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                warn!("⚠️  采集线程 {:?} 内未退出, 分离线程", timeout);
                self.join.take();
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }

        match self.join.take()?.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!("❌ 采集线程异常退出");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::input::Frame;
    use crate::pipeline::channel::{FrameChannel, Popped};
    use image::RgbImage;

    /// 读出固定帧数后结束, 可在指定帧失败
    struct CountingSource {
        total: u64,
        fail_at: Option<u64>,
        next: u64,
    }

    impl FrameSource for CountingSource {
        fn label(&self) -> &str {
            "counting"
        }

        fn read(&mut self) -> Result<Option<Frame>> {
            if Some(self.next) == self.fail_at {
                return Err(Error::StreamRead("broken pipe".to_string()));
            }
            if self.next >= self.total {
                return Ok(None);
            }
            let frame = Frame::new(RgbImage::new(2, 2), self.next);
            self.next += 1;
            Ok(Some(frame))
        }
    }

    fn source(total: u64, fail_at: Option<u64>) -> CountingSource {
        CountingSource {
            total,
            fail_at,
            next: 0,
        }
    }

    #[test]
    fn test_end_of_stream_closes_channel() {
        let (tx, rx) = FrameChannel::bounded(8, Duration::from_millis(5));
        let running = RunFlag::new();
        let report = Ingestor::new(source(3, None), tx, running.clone()).run();

        assert_eq!(report.exit, IngestExit::EndOfStream);
        assert_eq!(report.frames_read, 3);
        assert!(running.is_running());
        for id in 0..3 {
            assert!(matches!(rx.pop(Duration::from_millis(10)), Popped::Frame(f) if f.frame_id == id));
        }
        assert!(matches!(rx.pop(Duration::from_millis(10)), Popped::Closed));
    }

    #[test]
    fn test_read_failure_stops_pipeline() {
        let (tx, _rx) = FrameChannel::bounded(8, Duration::from_millis(5));
        let running = RunFlag::new();
        let report = Ingestor::new(source(10, Some(2)), tx, running.clone()).run();

        assert!(matches!(report.exit, IngestExit::ReadFailed(_)));
        assert_eq!(report.frames_read, 2);
        assert!(!running.is_running());
    }

    #[test]
    fn test_stop_unblocks_producer_on_full_channel() {
        let (tx, rx) = FrameChannel::bounded(2, Duration::from_millis(5));
        let running = RunFlag::new();
        let mut handle = Ingestor::new(source(100, None), tx, running.clone())
            .spawn()
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(rx.len(), 2);
        assert!(!handle.is_finished());

        running.stop();
        let report = handle.join_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(report.exit, IngestExit::Stopped);
        // 两帧在队列里, 一帧在入队途中被交还
        assert_eq!(report.frames_read, 3);
        assert!(handle.is_finished());
    }
}
