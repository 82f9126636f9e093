//! 告警截图存储
//! Evidence snapshot persistence

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use log::info;

use crate::detection::TrackId;
use crate::error::{Error, Result};

/// 截图文件名 (不含扩展名): `alert_track_{id}_{YYYYMMDD_HHMMSS}`
pub fn snapshot_name(track_id: TrackId, at: &DateTime<Local>) -> String {
    format!("alert_track_{}_{}", track_id, at.format("%Y%m%d_%H%M%S"))
}

/// 截图持久化接口
pub trait SnapshotStore {
    /// 以 `name` 保存截图, 返回文件路径
    fn persist(&self, image: &RgbImage, name: &str) -> Result<PathBuf>;
}

/// JPEG截图目录
pub struct JpegSnapshotStore {
    dir: PathBuf,
    quality: u8,
}

impl JpegSnapshotStore {
    /// 打开截图目录, 不存在时创建
    pub fn create(dir: impl AsRef<Path>, quality: u8) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::Snapshot {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        info!("📁 告警截图目录: {}", dir.display());
        Ok(Self {
            dir,
            quality: quality.clamp(1, 100),
        })
    }

    fn write_jpeg(&self, image: &RgbImage, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(image)?;
        // 缓冲区中的数据必须落盘成功才算保存成功
        writer.flush()?;
        Ok(())
    }
}

impl SnapshotStore for JpegSnapshotStore {
    fn persist(&self, image: &RgbImage, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.jpg", name));
        self.write_jpeg(image, &path).map_err(|e| Error::Snapshot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(path)
    }
}
