//! 检测器接口 (Detector)
//! 职责: 输入一帧 → 检测+跟踪 → 输出带跟踪ID的检测框

use super::types::Detections;
use crate::input::Frame;

/// 目标检测与跟踪能力
///
/// 任意后端 (本地推理、远程推理服务、测试桩) 只需实现这一个方法。
/// 返回 `None` 表示本帧检测失败, 流水线跳过该帧且不改变跟踪状态。
pub trait Detector {
    fn detect_and_track(&mut self, frame: &Frame) -> Option<Detections>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect_and_track(&mut self, frame: &Frame) -> Option<Detections> {
        (**self).detect_and_track(frame)
    }
}
