//! 口罩识别流水线 (Mask Pipeline)
//! 职责: 原始检测 → 会话平滑 → FrameResponse

use std::sync::Arc;

use super::{round_confidence, FaceResult, FrameDetections, FrameResponse};
use crate::tracking::{SessionRegistry, UNTRACKED_ID};

/// 外部检测/分类模型接口
///
/// 对每帧返回人脸框、跟踪ID和原始分类结果.
pub trait FaceDetector<F> {
    fn detect(&mut self, frame: &F) -> anyhow::Result<FrameDetections>;
}

pub struct MaskPipeline {
    registry: Arc<SessionRegistry>,
    history_size: usize,
}

impl MaskPipeline {
    pub fn new(registry: Arc<SessionRegistry>, history_size: usize) -> Self {
        Self {
            registry,
            history_size,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 检测 + 平滑
    pub fn process<F, D>(
        &self,
        detector: &mut D,
        frame: &F,
        session_id: Option<&str>,
    ) -> anyhow::Result<FrameResponse>
    where
        D: FaceDetector<F>,
    {
        let detections = detector.detect(frame)?;
        Ok(self.annotate(session_id, detections))
    }

    /// 为一帧的检测结果附加平滑标签
    ///
    /// 没有 session_id 或目标未跟踪时直接使用原始结果.
    pub fn annotate(&self, session_id: Option<&str>, frame: FrameDetections) -> FrameResponse {
        let session = session_id.map(|id| self.registry.get_or_create(id, self.history_size));

        let mut results = Vec::with_capacity(frame.detections.len());
        for detection in frame.detections {
            let bbox = detection.bbox.clamp_to(frame.width, frame.height);
            if bbox.is_empty() {
                log::debug!("⚠️ 跳过空检测框: {:?}", detection.bbox);
                continue;
            }

            let track_id = detection.tracked_id();
            let (label, confidence) = match (&session, track_id) {
                (Some(session), Some(track_id)) => {
                    let smoothed =
                        session.ingest_and_smooth(track_id, detection.label, detection.confidence);
                    (smoothed.label, smoothed.confidence)
                }
                _ => (detection.label, detection.confidence),
            };

            results.push(FaceResult {
                bbox,
                label,
                confidence: round_confidence(confidence),
                track_id: session.as_ref().map(|_| track_id.unwrap_or(UNTRACKED_ID)),
            });
        }

        FrameResponse {
            faces_detected: results.len(),
            results,
            width: frame.width,
            height: frame.height,
            session_id: session_id.map(str::to_string),
        }
    }
}
