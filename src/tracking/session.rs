//! 跟踪会话 (Tracking session)
//!
//! 一个视频流 (session_id) 对应一个会话, 保存该流内每个 track 的预测历史.
//! 历史表与最后活跃时间由同一把互斥锁保护, 同一会话上的并发请求
//! 看到的始终是一致的状态.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::clock::Clock;
use super::history::TrackHistory;
use super::types::{MaskLabel, SmoothedPrediction};

/// 锁内状态
struct SessionState {
    histories: HashMap<i64, TrackHistory>,
    last_activity: Instant,
}

impl SessionState {
    fn ingest(
        &mut self,
        track_id: i64,
        label: MaskLabel,
        confidence: f32,
        history_size: usize,
        now: Instant,
    ) {
        let record = self
            .histories
            .entry(track_id)
            .or_insert_with(|| TrackHistory::new(history_size))
            .record(label, confidence, now);
        // 单调时钟, 但并发写入时取较大值保证不回退
        if record.observed_at() > self.last_activity {
            self.last_activity = record.observed_at();
        }
    }

    fn smoothed(&self, track_id: i64) -> SmoothedPrediction {
        self.histories
            .get(&track_id)
            .map(TrackHistory::smoothed_prediction)
            .unwrap_or(SmoothedPrediction::UNKNOWN)
    }
}

pub struct TrackingSession {
    session_id: String,
    history_size: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

impl TrackingSession {
    pub fn new(session_id: impl Into<String>, history_size: usize, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            session_id: session_id.into(),
            history_size: history_size.max(1),
            clock,
            state: Mutex::new(SessionState {
                histories: HashMap::new(),
                last_activity: now,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 每个 track 的平滑窗口长度
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("⚠️ 会话 {} 的锁已中毒, 继续使用内部状态", self.session_id);
            PoisonError::into_inner(poisoned)
        })
    }

    /// 记录一次原始分类结果并刷新活跃时间
    pub fn ingest(&self, track_id: i64, label: MaskLabel, confidence: f32) {
        let now = self.clock.now();
        self.lock()
            .ingest(track_id, label, confidence, self.history_size, now);
    }

    /// 获取 track 的平滑结果; 未见过的 track 返回 (Unknown, 0.0)
    pub fn smoothed(&self, track_id: i64) -> SmoothedPrediction {
        self.lock().smoothed(track_id)
    }

    /// 在同一临界区内记录并读取平滑结果
    pub fn ingest_and_smooth(
        &self,
        track_id: i64,
        label: MaskLabel,
        confidence: f32,
    ) -> SmoothedPrediction {
        let now = self.clock.now();
        let mut state = self.lock();
        state.ingest(track_id, label, confidence, self.history_size, now);
        state.smoothed(track_id)
    }

    /// 距上次活动是否小于 `timeout`
    pub fn is_active(&self, timeout: Duration) -> bool {
        self.idle_for() < timeout
    }

    /// 距上次活动经过的时间
    pub fn idle_for(&self) -> Duration {
        let last_activity = self.lock().last_activity;
        self.clock.now().saturating_duration_since(last_activity)
    }

    /// 当前会话内的 track 数量
    pub fn track_count(&self) -> usize {
        self.lock().histories.len()
    }

    /// 持锁时 panic, 使会话锁进入中毒状态
    #[cfg(test)]
    pub(crate) fn poison_state(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.state.lock();
            panic!("panic while holding session {}", self.session_id);
        }));
        assert!(self.state.is_poisoned());
    }
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession")
            .field("session_id", &self.session_id)
            .field("history_size", &self.history_size)
            .field("tracks", &self.track_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::clock::ManualClock;
    use crate::tracking::types::MaskLabel::{Mask, NoMask};

    fn session_with_clock(history_size: usize) -> (TrackingSession, ManualClock) {
        let clock = ManualClock::new();
        let session = TrackingSession::new("s1", history_size, Arc::new(clock.clone()));
        (session, clock)
    }

    #[test]
    fn test_unseen_track_is_unknown() {
        let (session, _) = session_with_clock(5);
        assert_eq!(session.smoothed(7), SmoothedPrediction::UNKNOWN);
        // 查询不会创建历史
        assert_eq!(session.track_count(), 0);
    }

    #[test]
    fn test_tracks_are_independent() {
        let (session, _) = session_with_clock(5);
        session.ingest(1, Mask, 0.9);
        session.ingest(2, NoMask, 0.6);
        session.ingest(2, NoMask, 0.8);

        assert_eq!(session.smoothed(1), SmoothedPrediction::new(Mask, 0.9));
        let two = session.smoothed(2);
        assert_eq!(two.label, NoMask);
        assert!((two.confidence - 0.7).abs() < 1e-5);
        assert_eq!(session.track_count(), 2);
    }

    #[test]
    fn test_history_size_applies_to_new_tracks() {
        let (session, _) = session_with_clock(2);
        for _ in 0..3 {
            session.ingest(1, Mask, 0.9);
        }
        session.ingest(1, NoMask, 0.4);
        session.ingest(1, NoMask, 0.6);
        let smoothed = session.smoothed(1);
        assert_eq!(smoothed.label, NoMask);
        assert!((smoothed.confidence - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_activity_refreshed_by_ingest() {
        let (session, clock) = session_with_clock(5);
        let timeout = Duration::from_secs(300);

        clock.advance(Duration::from_secs(200));
        assert!(session.is_active(timeout));
        session.ingest(1, Mask, 0.9);

        clock.advance(Duration::from_secs(200));
        assert!(session.is_active(timeout));
        assert_eq!(session.idle_for(), Duration::from_secs(200));

        clock.advance(Duration::from_secs(100));
        assert!(!session.is_active(timeout));
    }

    #[test]
    fn test_ingest_and_smooth() {
        let (session, _) = session_with_clock(5);
        session.ingest(3, NoMask, 0.6);
        let smoothed = session.ingest_and_smooth(3, NoMask, 0.8);
        assert_eq!(smoothed.label, NoMask);
        assert!((smoothed.confidence - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_poisoned_session_still_usable() {
        let (session, clock) = session_with_clock(5);
        session.ingest(1, Mask, 0.9);
        session.poison_state();

        assert_eq!(session.smoothed(1), SmoothedPrediction::new(Mask, 0.9));
        session.ingest(1, Mask, 0.7);
        assert!((session.smoothed(1).confidence - 0.8).abs() < 1e-5);

        clock.advance(Duration::from_secs(10));
        assert!(session.is_active(Duration::from_secs(300)));
    }
}
