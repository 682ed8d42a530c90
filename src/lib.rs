// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 跟踪参数配置
pub mod error; // 错误类型
pub mod pipeline; // 帧处理流水线
pub mod tracking; // 跟踪会话系统

pub use crate::config::TrackerConfig;
pub use crate::error::{Result, TrackerError};
pub use crate::pipeline::{FaceDetector, FrameResponse, MaskPipeline};
pub use crate::tracking::{
    MaskLabel, Reaper, SessionRegistry, SmoothedPrediction, TrackHistory, TrackingSession,
};
