//! 告警推送 (multipart/form-data HTTP POST)
//! Remote alert notification over the alerting API wire contract

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use rand::Rng;

use crate::config::AlertConfig;
use crate::detection::TrackId;
use crate::error::{Error, Result};

/// 一次告警的推送内容
#[derive(Clone, Debug)]
pub struct AlertNotice {
    pub alert_id: String,
    pub track_id: TrackId,
    pub elapsed_secs: f64,
    pub time: DateTime<Local>,
    pub source_label: String,
    pub image_path: PathBuf, // 已保存的截图
}

impl AlertNotice {
    /// ISO-8601 本地时间
    pub fn iso_time(&self) -> String {
        self.time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }

    pub fn description(&self) -> String {
        format!(
            "Loitering alert: Track ID {} detected for {:.1}s from {}.",
            self.track_id, self.elapsed_secs, self.source_label
        )
    }
}

/// 推送成功的回执
#[derive(Clone, Debug, PartialEq)]
pub struct NotifyReceipt {
    pub status: u16,
    pub body: String,
}

/// 告警推送接口
pub trait AlertNotifier {
    /// 2xx 返回回执, 其余状态码返回 `AlertRejected`, 网络错误返回 `AlertTransport`
    fn notify(&self, notice: &AlertNotice) -> Result<NotifyReceipt>;
}

/// multipart/form-data 请求体
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        let boundary = format!("----sentinel{:016x}", rand::thread_rng().gen::<u64>());
        Self::with_boundary(boundary)
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// 结束请求体, 返回 (Content-Type, body)
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

/// 告警接口要求文本字段的值本身带双引号
fn quoted(value: &str) -> String {
    format!("\"{}\"", value)
}

/// 构造告警表单
pub fn build_alert_form(form: MultipartForm, notice: &AlertNotice, image: &[u8]) -> MultipartForm {
    let filename = notice
        .image_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("alert.jpg")
        .to_string();

    form.text("alerts[id]", &quoted(&notice.alert_id))
        .text("alerts[time]", &quoted(&notice.iso_time()))
        .text("alerts[description]", &quoted(&notice.description()))
        .file("alerts[image]", &filename, "image/jpeg", image)
}

/// HTTP告警推送 (同步请求, 静态密钥认证)
pub struct HttpAlertNotifier {
    agent: ureq::Agent,
    api_url: String,
    api_key: String,
}

impl HttpAlertNotifier {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            Duration::from_secs_f64(config.http_timeout_secs.max(0.1)),
        )
    }

    fn read_image(path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| {
            Error::AlertTransport(format!("无法读取告警截图 {}: {}", path.display(), e))
        })
    }
}

impl AlertNotifier for HttpAlertNotifier {
    fn notify(&self, notice: &AlertNotice) -> Result<NotifyReceipt> {
        let image = Self::read_image(&notice.image_path)?;
        let (content_type, body) = build_alert_form(MultipartForm::new(), notice, &image).finish();

        let response = self
            .agent
            .post(&self.api_url)
            .set("Authorization", &format!("API_KEY {}", self.api_key))
            .set("Content-Type", &content_type)
            .send_bytes(&body);

        match response {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().unwrap_or_default();
                if (200..300).contains(&status) {
                    Ok(NotifyReceipt { status, body })
                } else {
                    Err(Error::AlertRejected { status, body })
                }
            }
            Err(ureq::Error::Status(status, response)) => Err(Error::AlertRejected {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(Error::AlertTransport(transport.to_string()))
            }
        }
    }
}
