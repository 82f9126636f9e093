/// 帧队列 (采集线程 → 检测线程)
/// Bounded single-producer single-consumer frame channel
///
/// 队列满时生产端阻塞 (按固定间隔轮询运行标志), 从不丢帧或覆盖。
/// 生产端释放 `FrameSender` 即关闭队列, 消费端取完剩余帧后得到 `Closed`。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::input::Frame;

/// 全流程运行标志, 两个线程共享
#[derive(Clone, Debug)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// 入队失败原因 (帧随错误一起交还)
#[derive(Debug)]
pub enum PushError {
    /// 等待空位期间运行标志被清除
    Stopped(Frame),
    /// 消费端已释放
    Closed(Frame),
}

/// 出队结果
#[derive(Debug)]
pub enum Popped {
    Frame(Frame),
    /// 超时内没有新帧
    Empty,
    /// 队列已空且生产端已关闭
    Closed,
}

pub struct FrameChannel;

impl FrameChannel {
    pub const DEFAULT_CAPACITY: usize = 10;

    /// 创建容量为 `capacity` 的帧队列
    pub fn bounded(capacity: usize, poll: Duration) -> (FrameSender, FrameReceiver) {
        let (tx, rx) = bounded(capacity.max(1));
        (FrameSender { tx, poll }, FrameReceiver { rx })
    }
}

pub struct FrameSender {
    tx: Sender<Frame>,
    poll: Duration, // 队列满时的轮询间隔
}

impl FrameSender {
    /// 入队; 队列满时阻塞直到有空位或运行标志被清除
    pub fn push(&self, frame: Frame, running: &RunFlag) -> Result<(), PushError> {
        let mut frame = frame;
        loop {
            match self.tx.send_timeout(frame, self.poll) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !running.is_running() {
                        return Err(PushError::Stopped(returned));
                    }
                    frame = returned;
                }
                Err(SendTimeoutError::Disconnected(returned)) => {
                    return Err(PushError::Closed(returned));
                }
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

}

pub struct FrameReceiver {
    rx: Receiver<Frame>,
}

impl FrameReceiver {
    /// 出队, 最多等待 `timeout`
    pub fn pop(&self, timeout: Duration) -> Popped {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Popped::Frame(frame),
            Err(RecvTimeoutError::Timeout) => Popped::Empty,
            Err(RecvTimeoutError::Disconnected) => Popped::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
