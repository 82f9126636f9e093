//! 检测结果回放 (Replay Detector)
//! 从 JSON Lines 文件读取离线记录的检测+跟踪结果, 按帧序号回放
//!
//! 每行一条记录:
//! `{"frame": 12, "boxes": [[x1, y1, x2, y2], ...], "track_ids": [7, 9]}`
//! `track_ids` 为 `null` 表示该帧的框没有跟踪ID。

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::info;
use serde::Deserialize;

use super::detector::Detector;
use super::types::{BBox, Detections, TrackId};
use crate::error::{Error, Result};
use crate::input::Frame;

#[derive(Debug, Deserialize)]
struct DetectionRecord {
    frame: u64,
    #[serde(default)]
    boxes: Vec<[f32; 4]>,
    #[serde(default)]
    track_ids: Option<Vec<TrackId>>,
}

pub struct ReplayDetector {
    records: HashMap<u64, Detections>,
}

impl ReplayDetector {
    /// 没有任何记录: 每帧都是空结果
    pub fn empty() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let detector = Self::from_reader(reader)?;
        info!(
            "✅ 检测记录已加载: {} 帧 ({})",
            detector.records.len(),
            path.display()
        );
        Ok(detector)
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut records = HashMap::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record: DetectionRecord = serde_json::from_str(line)?;
            let boxes: Vec<BBox> = record.boxes.into_iter().map(BBox::from).collect();
            let detections = match record.track_ids {
                Some(ids) => Detections::tracked(boxes, ids).map_err(|e| {
                    Error::Config(format!("检测记录第 {} 行: {}", line_no + 1, e))
                })?,
                None => Detections::untracked(boxes),
            };
            records.insert(record.frame, detections);
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn detect_and_track(&mut self, frame: &Frame) -> Option<Detections> {
        // 没有记录的帧视为无目标
        Some(
            self.records
                .get(&frame.frame_id)
                .cloned()
                .unwrap_or_else(Detections::empty),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(id: u64) -> Frame {
        Frame::new(RgbImage::new(8, 8), id)
    }

    #[test]
    fn test_replays_records_by_frame() {
        let log = r#"
# frame records
{"frame": 0, "boxes": [[1, 2, 3, 4]], "track_ids": [7]}
{"frame": 2, "boxes": [[0, 0, 5, 5], [6, 6, 8, 8]], "track_ids": null}
"#;
        let mut detector = ReplayDetector::from_reader(log.as_bytes()).unwrap();
        assert_eq!(detector.len(), 2);

        let first = detector.detect_and_track(&frame(0)).unwrap();
        assert_eq!(first.visible_ids(), vec![7]);
        assert_eq!(first.boxes()[0], BBox::new(1.0, 2.0, 3.0, 4.0));

        let missing = detector.detect_and_track(&frame(1)).unwrap();
        assert!(missing.is_empty());

        let untracked = detector.detect_and_track(&frame(2)).unwrap();
        assert_eq!(untracked.boxes().len(), 2);
        assert!(untracked.visible_ids().is_empty());
    }

    #[test]
    fn test_rejects_mismatched_record() {
        let log = r#"{"frame": 0, "boxes": [[1, 2, 3, 4]], "track_ids": [7, 8]}"#;
        assert!(matches!(
            ReplayDetector::from_reader(log.as_bytes()),
            Err(Error::Config(_))
        ));
    }
}
