/// 视频处理流水线 (Video Processing Pipeline)
///
/// 双线程架构, 通过有界帧队列通信:
/// - Ingestor: 读帧入队 (独立线程)
/// - Pipeline: 检测 + 驻留计时 + 告警 + 渲染 (调用线程)
pub mod channel;
pub mod ingestor;
pub mod processor;

use log::info;

use crate::alert::AlertDispatcher;
use crate::config::Config;
use crate::detection::Detector;
use crate::error::Result;
use crate::input::FrameSource;
use crate::renderer::Renderer;
use crate::tracking::{Clock, DwellTracker};

pub use channel::{FrameChannel, FrameReceiver, FrameSender, Popped, PushError, RunFlag};
pub use ingestor::{IngestExit, IngestReport, Ingestor, IngestorHandle};
pub use processor::{FrameOutcome, Pipeline, PipelineStats};

/// 一次运行的汇总
#[derive(Clone, Debug)]
pub struct SentinelReport {
    pub stats: PipelineStats,
    /// 采集线程未能在限定时间内退出时为 `None`
    pub ingest: Option<IngestReport>,
}

/// 组装并运行整条流水线
pub struct Sentinel<D: Detector, R: Renderer, C: Clock> {
    pipeline: Pipeline<D, R, C>,
    ingestor: IngestorHandle,
    running: RunFlag,
    join_timeout: std::time::Duration,
}

impl<D: Detector, R: Renderer, C: Clock> Sentinel<D, R, C> {
    /// 创建帧队列并启动采集线程
    pub fn start<S: FrameSource + 'static>(
        config: &Config,
        source: S,
        detector: D,
        renderer: R,
        dispatcher: AlertDispatcher,
        clock: C,
    ) -> Result<Self> {
        info!("🚀 启动流水线: {}", source.label());
        let (sender, receiver) =
            FrameChannel::bounded(config.channel.capacity, config.channel.push_poll());
        let running = RunFlag::new();

        let ingestor = Ingestor::new(source, sender, running.clone()).spawn()?;
        let tracker = DwellTracker::with_clock(config.dwell.clone(), clock);
        let pipeline = Pipeline::new(
            detector,
            renderer,
            tracker,
            dispatcher,
            receiver,
            running.clone(),
            config.channel.pop_timeout(),
        );

        Ok(Self {
            pipeline,
            ingestor,
            running,
            join_timeout: config.channel.join_timeout(),
        })
    }

    /// 运行标志, 清除即请求停止 (如 Ctrl-C 处理)
    pub fn run_flag(&self) -> RunFlag {
        self.running.clone()
    }

    /// 在调用线程上运行消费循环, 结束后关闭
    pub fn run(mut self) -> SentinelReport {
        let stats = self.pipeline.run(&self.ingestor);
        self.shutdown(stats)
    }

    /// 清除运行标志 → 限时等待采集线程 → 释放渲染器等资源
    fn shutdown(mut self, stats: PipelineStats) -> SentinelReport {
        info!("🧹 开始清理...");
        self.running.stop();
        let ingest = self.ingestor.join_timeout(self.join_timeout);
        drop(self.pipeline);
        info!("✅ 清理完成");
        SentinelReport { stats, ingest }
    }
}
