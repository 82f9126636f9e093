//! 错误类型定义
//! Error types shared by every system of the sentinel

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// 视频源无法打开 (致命)
    #[error("无法打开视频源 {source_label}: {reason}")]
    StreamOpen { source_label: String, reason: String },

    /// 读帧失败 (致命)
    #[error("视频流读取失败: {0}")]
    StreamRead(String),

    #[error("配置无效: {0}")]
    Config(String),

    /// 检测器输出的框与ID数量不一致
    #[error("检测结果不一致: {boxes} 个框, {ids} 个跟踪ID")]
    MismatchedDetections { boxes: usize, ids: usize },

    #[error("保存告警截图失败 {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    /// 告警接口返回非2xx
    #[error("告警接口拒绝请求: HTTP {status}, 响应: {body}")]
    AlertRejected { status: u16, body: String },

    #[error("告警发送失败: {0}")]
    AlertTransport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
