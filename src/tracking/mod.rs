/// 跟踪会话系统 (Tracking Session System)
///
/// 为无状态HTTP接口保存跨帧的分类状态
/// - TrackHistory:    单目标预测历史 + 多数投票平滑
/// - TrackingSession: 单个视频流的所有 track
/// - SessionRegistry: 会话注册表 + 后台清理线程
pub mod clock;
pub mod history;
pub mod registry;
pub mod session;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use history::TrackHistory;
pub use registry::{Reaper, SessionRegistry};
pub use session::TrackingSession;
pub use types::{
    FaceBox, MaskLabel, PredictionRecord, SmoothedPrediction, DEFAULT_HISTORY_SIZE, UNTRACKED_ID,
};
