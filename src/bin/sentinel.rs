/// 驻留告警哨兵 (Dwell Sentinel)
///
/// 视频驻留时长监控: 目标停留超过阈值即保存截图并推送告警
///
/// 系统架构:
/// 1. 采集线程: 读帧入队 (独立工作线程)
/// 2. 主线程:   检测 + 驻留计时 + 告警 + 标注
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use dwell_sentinel::pipeline::IngestExit;
use dwell_sentinel::{
    AlertDispatcher, Config, Detector, FrameSource, HttpAlertNotifier, ImageDirSource,
    JpegSnapshotStore, MonotonicClock, OverlayRenderer, ReplayDetector, Sentinel,
};

/// 驻留告警参数 (覆盖配置文件)
#[derive(Parser, Debug)]
#[command(author, version, about = "驻留告警哨兵 - 视频驻留时长监控", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写出默认配置)
    #[arg(short, long, default_value = "sentinel_config.json")]
    config: PathBuf,

    /// 视频源: 图片目录, 或视频文件/RTSP地址 (需 ffmpeg 特性)
    #[arg(short, long)]
    source: Option<String>,

    /// 离线检测记录 (JSON Lines)
    #[arg(short, long)]
    detections: Option<PathBuf>,

    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, env = "SENTINEL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// 驻留告警阈值(秒)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// 预警比例 (0, 1]
    #[arg(long)]
    warn_fraction: Option<f64>,

    /// 告警截图目录
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// 最新标注帧输出路径
    #[arg(long)]
    preview: Option<PathBuf>,

    /// 标签字体 (ttf/otf)
    #[arg(long)]
    font: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(source) = self.source {
            config.input_source = source;
        }
        if let Some(url) = self.api_url {
            config.alert.api_url = url;
        }
        if let Some(key) = self.api_key {
            config.alert.api_key = key;
        }
        if let Some(threshold) = self.threshold {
            config.dwell.alert_threshold_secs = threshold;
        }
        if let Some(fraction) = self.warn_fraction {
            config.dwell.warn_fraction = fraction;
        }
        if let Some(dir) = self.image_dir {
            config.alert.image_dir = dir;
        }
        if let Some(preview) = self.preview {
            config.render.preview_path = Some(preview);
        }
        if let Some(font) = self.font {
            config.render.font_path = Some(font);
        }
    }
}

fn open_source(config: &Config) -> Result<Box<dyn FrameSource>> {
    let input = config.input_source.as_str();
    if Path::new(input).is_dir() {
        let source = ImageDirSource::open(input, config.frame_rate)
            .with_context(|| format!("打开图片目录 {}", input))?;
        info!("✅ 图片序列已打开: {} 帧", source.frame_count());
        return Ok(Box::new(source));
    }
    open_stream(input)
}

#[cfg(feature = "ffmpeg")]
fn open_stream(input: &str) -> Result<Box<dyn FrameSource>> {
    let source = dwell_sentinel::input::FfmpegSource::open(input)
        .with_context(|| format!("打开视频源 {}", input))?;
    info!("✅ 视频源已打开: {}", input);
    Ok(Box::new(source))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_stream(input: &str) -> Result<Box<dyn FrameSource>> {
    bail!("{} 不是图片目录; 视频文件/RTSP输入需要启用 ffmpeg 特性", input)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let detections = args.detections.clone();
    let mut config = Config::load(&args.config)
        .with_context(|| format!("加载配置 {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    info!("🚀 驻留告警哨兵启动");
    config.print_summary();

    let source = open_source(&config)?;

    let detector: Box<dyn Detector> = match &detections {
        Some(path) => Box::new(
            ReplayDetector::load(path)
                .with_context(|| format!("加载检测记录 {}", path.display()))?,
        ),
        None => {
            info!("⚠️  未指定检测记录, 所有帧按无目标处理");
            Box::new(ReplayDetector::empty())
        }
    };

    let store = JpegSnapshotStore::create(&config.alert.image_dir, config.alert.jpeg_quality)
        .context("创建告警截图目录")?;
    let notifier = HttpAlertNotifier::from_config(&config.alert);
    let dispatcher = AlertDispatcher::new(
        Box::new(store),
        Box::new(notifier),
        config.alert.alert_id.clone(),
        config.input_source.clone(),
    );
    let renderer = OverlayRenderer::new(&config.render);

    let sentinel = Sentinel::start(&config, source, detector, renderer, dispatcher, MonotonicClock)
        .context("启动流水线")?;

    let flag = sentinel.run_flag();
    if let Err(e) = ctrlc::set_handler(move || flag.stop()) {
        warn!("⚠️  Ctrl-C 处理器安装失败: {}", e);
    }
    info!("💡 按 Ctrl-C 停止");
    let report = sentinel.run();

    info!(
        "📊 统计: 处理 {} 帧 | 跳过 {} 帧 | 告警 {} 次",
        report.stats.frames_processed, report.stats.frames_skipped, report.stats.alerts_dispatched
    );
    if let Some(ingest) = &report.ingest {
        info!("📹 采集: {} 帧 ({:?})", ingest.frames_read, ingest.exit);
        if let IngestExit::ReadFailed(reason) = &ingest.exit {
            bail!("视频流读取失败: {}", reason);
        }
    }
    Ok(())
}
