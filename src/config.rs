//! 系统配置 - 通过JSON文件调整参数
//! Sentinel configuration, one explicit value handed to every component

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 驻留判定参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellConfig {
    pub alert_threshold_secs: f64, // 驻留告警阈值(秒)
    pub warn_fraction: f64,        // 预警比例 (0, 1]
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            alert_threshold_secs: 1.0,
            warn_fraction: 0.6,
        }
    }
}

impl DwellConfig {
    /// 预警阈值(秒) = 告警阈值 × 预警比例
    pub fn warn_threshold_secs(&self) -> f64 {
        self.alert_threshold_secs * self.warn_fraction
    }
}

/// 帧队列参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub capacity: usize,        // 队列容量
    pub pop_timeout_secs: f64,  // 消费端取帧超时
    pub push_poll_ms: u64,      // 队列满时生产端轮询间隔
    pub join_timeout_ms: u64,   // 关闭时等待采集线程的上限
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            pop_timeout_secs: 10.0,
            push_poll_ms: 10,
            join_timeout_ms: 1000,
        }
    }
}

impl ChannelConfig {
    pub fn pop_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.pop_timeout_secs)
    }

    pub fn push_poll(&self) -> Duration {
        Duration::from_millis(self.push_poll_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// 告警接口参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub api_url: String,
    pub api_key: String,
    pub alert_id: String,
    pub image_dir: PathBuf,     // 告警截图保存目录
    pub http_timeout_secs: f64,
    pub jpeg_quality: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            api_url: "https://virtual-alt-api.surveillant.tech/api/v1/alerts".to_string(),
            api_key: String::new(),
            alert_id: "f265b6e4-1faf-4595-82d2-fc1386b6a4d9".to_string(),
            image_dir: PathBuf::from("alert_images"),
            http_timeout_secs: 10.0,
            jpeg_quality: 90,
        }
    }
}

/// 画面标注参数
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub font_path: Option<PathBuf>,    // 标签字体 (未配置则只画框)
    pub preview_path: Option<PathBuf>, // 最新标注帧输出路径
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_source: String,
    pub frame_rate: Option<f64>, // 图片序列的回放帧率
    pub dwell: DwellConfig,
    pub channel: ChannelConfig,
    pub alert: AlertConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_source: "videos/sample_footage.mp4".to_string(),
            frame_rate: None,
            dwell: DwellConfig::default(),
            channel: ChannelConfig::default(),
            alert: AlertConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Config {
    /// 从JSON文件加载配置; 文件不存在时写出默认配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                let config: Self = serde_json::from_str(&json)?;
                info!("✅ 配置已从 {} 加载", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("⚠️  默认配置写出失败: {}", e);
                }
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.dwell.alert_threshold_secs > 0.0) {
            return Err(Error::Config(format!(
                "alert_threshold_secs 必须为正数, 当前 {}",
                self.dwell.alert_threshold_secs
            )));
        }
        if !(self.dwell.warn_fraction > 0.0 && self.dwell.warn_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "warn_fraction 必须在 (0, 1] 之内, 当前 {}",
                self.dwell.warn_fraction
            )));
        }
        if self.channel.capacity == 0 {
            return Err(Error::Config("channel.capacity 不能为 0".to_string()));
        }
        if !(self.channel.pop_timeout_secs > 0.0) {
            return Err(Error::Config("channel.pop_timeout_secs 必须为正数".to_string()));
        }
        if let Some(fps) = self.frame_rate {
            if !(fps > 0.0) {
                return Err(Error::Config(format!("frame_rate 必须为正数, 当前 {}", fps)));
            }
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前配置:");
        info!("  视频源: {}", self.input_source);
        info!(
            "  驻留阈值: {:.1}s (预警 {:.0}%)",
            self.dwell.alert_threshold_secs,
            self.dwell.warn_fraction * 100.0
        );
        info!(
            "  帧队列: 容量 {} | 取帧超时 {:.0}s",
            self.channel.capacity, self.channel.pop_timeout_secs
        );
        info!("  告警接口: {}", self.alert.api_url);
        info!("  截图目录: {}", self.alert.image_dir.display());
    }
}
