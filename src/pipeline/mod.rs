/// 帧处理流水线 (Frame Pipeline)
///
/// 检测模型是外部组件, 这里只负责把每帧的原始分类结果
/// 接入跟踪会话, 输出平滑后的结果:
/// - FaceDetector: 外部检测/分类模型接口
/// - MaskPipeline: 原始检测 → 平滑标签 → FrameResponse
pub mod detector;

pub use detector::{FaceDetector, MaskPipeline};

use serde::{Deserialize, Serialize};

use crate::tracking::{FaceBox, MaskLabel, UNTRACKED_ID};

// ========== 输入数据 ==========

/// 单个人脸的原始检测结果 (检测模型 → 流水线)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "box")]
    pub bbox: FaceBox,
    /// 跟踪器分配的ID, None 或 -1 表示未跟踪
    #[serde(default)]
    pub track_id: Option<i64>,
    pub label: MaskLabel,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(bbox: FaceBox, track_id: Option<i64>, label: MaskLabel, confidence: f32) -> Self {
        Self {
            bbox,
            track_id,
            label,
            confidence,
        }
    }

    /// 由分类器原始输出 (no_mask, mask) 构建
    pub fn from_scores(bbox: FaceBox, track_id: Option<i64>, no_mask: f32, mask: f32) -> Self {
        let (label, confidence) = MaskLabel::from_scores(no_mask, mask);
        Self::new(bbox, track_id, label, confidence)
    }

    /// 有效的跟踪ID (排除 -1)
    pub fn tracked_id(&self) -> Option<i64> {
        self.track_id.filter(|&id| id != UNTRACKED_ID)
    }
}

/// 一帧的全部检测结果
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

// ========== 输出数据 ==========

/// 单个人脸的输出结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    #[serde(rename = "box")]
    pub bbox: FaceBox,
    pub label: MaskLabel,
    pub confidence: f32,
    /// 仅在有 session_id 时输出, 未跟踪目标为 -1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<i64>,
}

/// 一帧的响应
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameResponse {
    pub faces_detected: usize,
    pub results: Vec<FaceResult>,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// 保留4位小数
pub fn round_confidence(confidence: f32) -> f32 {
    (confidence * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_id() {
        let b = FaceBox::new(0, 0, 10, 10);
        assert_eq!(RawDetection::new(b, Some(3), MaskLabel::Mask, 0.9).tracked_id(), Some(3));
        assert_eq!(RawDetection::new(b, Some(-1), MaskLabel::Mask, 0.9).tracked_id(), None);
        assert_eq!(RawDetection::new(b, None, MaskLabel::Mask, 0.9).tracked_id(), None);
    }

    #[test]
    fn test_detection_json() {
        let json = r#"{"box":{"startX":1,"startY":2,"endX":30,"endY":40},"label":"No Mask","confidence":0.7}"#;
        let det: RawDetection = serde_json::from_str(json).unwrap();
        assert_eq!(det.label, MaskLabel::NoMask);
        assert_eq!(det.track_id, None);
        assert_eq!(det.bbox.end_y, 40);
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.123_456), 0.1235);
        assert_eq!(round_confidence(0.8), 0.8);
    }
}
