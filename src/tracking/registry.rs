//! 会话注册表 + 后台清理线程
//! Session registry with a background reaper
//!
//! - 所有会话由注册表独占, 调用方每次请求都通过 session_id 获取
//! - get_or_create / remove / 清理 共用一把锁, 同一 session_id 只会创建一次
//! - 清理线程按固定周期扫描, 一次加锁批量移除超时会话

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use super::clock::{Clock, SystemClock};
use super::session::TrackingSession;
use crate::config::TrackerConfig;

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<TrackingSession>>>,
    cleanup_interval: Duration,
    session_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(cleanup_interval: Duration, session_timeout: Duration) -> Self {
        Self::with_clock(cleanup_interval, session_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(
        cleanup_interval: Duration,
        session_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            cleanup_interval,
            session_timeout,
            clock,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.cleanup_interval(), config.session_timeout())
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<TrackingSession>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            log::warn!("⚠️ 会话注册表的锁已中毒, 继续使用内部状态");
            PoisonError::into_inner(poisoned)
        })
    }

    /// 获取已有会话, 不存在则创建
    ///
    /// 已有会话保持创建时的 `history_size`.
    pub fn get_or_create(&self, session_id: &str, history_size: usize) -> Arc<TrackingSession> {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get(session_id) {
            return Arc::clone(session);
        }

        let session = Arc::new(TrackingSession::new(
            session_id,
            history_size,
            Arc::clone(&self.clock),
        ));
        sessions.insert(session_id.to_string(), Arc::clone(&session));
        log::debug!(
            "🆕 创建跟踪会话: {} (窗口 {} 帧, 共 {} 个会话)",
            session_id,
            session.history_size(),
            sessions.len()
        );
        session
    }

    /// 移除会话, 不存在时什么也不做
    pub fn remove(&self, session_id: &str) {
        if self.lock().remove(session_id).is_some() {
            log::debug!("🗑️ 移除跟踪会话: {}", session_id);
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    /// 当前会话数量 (诊断用)
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// 当前所有会话ID (已排序)
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 执行一次清理: 移除所有超时会话, 返回被移除的 session_id
    pub fn cleanup_inactive_sessions(&self) -> Vec<String> {
        let timeout = self.session_timeout;
        let mut sessions = self.lock();

        let mut inactive: Vec<String> = Vec::new();
        for (session_id, session) in sessions.iter() {
            // 单个会话出错不影响其他会话
            match panic::catch_unwind(AssertUnwindSafe(|| session.is_active(timeout))) {
                Ok(true) => {}
                Ok(false) => inactive.push(session_id.clone()),
                Err(_) => log::error!("❌ 检查会话 {} 活跃状态失败, 跳过", session_id),
            }
        }

        for session_id in &inactive {
            sessions.remove(session_id);
            log::info!("🧹 清理不活跃会话: {}", session_id);
        }
        inactive
    }

    /// 启动后台清理线程
    pub fn spawn_reaper(self: &Arc<Self>) -> std::io::Result<Reaper> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let registry = Arc::clone(self);

        let handle = thread::Builder::new()
            .name("session-reaper".to_string())
            .spawn(move || {
                log::info!(
                    "🧹 会话清理线程启动 (每 {:?} 检查一次, 超时 {:?})",
                    registry.cleanup_interval,
                    registry.session_timeout
                );

                let ticker = tick(registry.cleanup_interval);
                let mut cycles = 0_u64;

                loop {
                    select! {
                        recv(ticker) -> _ => {
                            cycles += 1;
                            let pass = panic::catch_unwind(AssertUnwindSafe(|| {
                                registry.cleanup_inactive_sessions()
                            }));
                            match pass {
                                Ok(evicted) if !evicted.is_empty() => {
                                    log::debug!(
                                        "🧹 清理周期 {}: 移除 {} 个会话 (剩余 {})",
                                        cycles,
                                        evicted.len(),
                                        registry.session_count()
                                    );
                                }
                                Ok(_) => {}
                                Err(_) => log::error!("❌ 清理周期 {} 失败, 等待下一周期", cycles),
                            }
                        }
                        recv(shutdown_rx) -> _ => {
                            log::info!("🛑 会话清理线程退出 (共 {} 个周期)", cycles);
                            break;
                        }
                    }
                }
            })?;

        Ok(Reaper {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

/// 后台清理线程句柄, drop 时自动停止
pub struct Reaper {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Reaper {
    /// 发送停止信号并等待线程退出
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("❌ 会话清理线程异常退出");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::clock::ManualClock;
    use crate::tracking::types::MaskLabel;

    fn registry_with_clock() -> (SessionRegistry, ManualClock) {
        let clock = ManualClock::new();
        let registry = SessionRegistry::with_clock(
            Duration::from_secs(60),
            Duration::from_secs(300),
            Arc::new(clock.clone()),
        );
        (registry, clock)
    }

    #[test]
    fn test_get_or_create_returns_same_session() {
        let (registry, _) = registry_with_clock();
        let a = registry.get_or_create("s1", 5);
        let b = registry.get_or_create("s1", 9);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.history_size(), 5);
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (registry, _) = registry_with_clock();
        registry.get_or_create("s1", 5);
        registry.remove("s1");
        registry.remove("s1");
        registry.remove("never-created");
        assert_eq!(registry.session_count(), 0);
        assert!(!registry.contains("s1"));
    }

    #[test]
    fn test_idle_session_evicted() {
        let (registry, clock) = registry_with_clock();
        registry.get_or_create("s1", 5);

        clock.advance(Duration::from_secs(400));
        let evicted = registry.cleanup_inactive_sessions();

        assert_eq!(evicted, vec!["s1".to_string()]);
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_recent_session_survives() {
        let (registry, clock) = registry_with_clock();
        registry.get_or_create("stale", 5);
        let fresh = registry.get_or_create("fresh", 5);

        clock.advance(Duration::from_secs(250));
        fresh.ingest(1, MaskLabel::Mask, 0.9);
        clock.advance(Duration::from_secs(100));

        let evicted = registry.cleanup_inactive_sessions();
        assert_eq!(evicted, vec!["stale".to_string()]);
        assert_eq!(registry.session_ids(), vec!["fresh".to_string()]);
    }

    #[test]
    fn test_poisoned_session_does_not_stop_sweep() {
        let (registry, clock) = registry_with_clock();
        registry.get_or_create("stale-a", 5);
        registry.get_or_create("stale-b", 5);
        let poisoned = registry.get_or_create("poisoned", 5);

        clock.advance(Duration::from_secs(200));
        poisoned.ingest(2, MaskLabel::NoMask, 0.6);
        poisoned.poison_state();
        clock.advance(Duration::from_secs(150));

        let mut evicted = registry.cleanup_inactive_sessions();
        evicted.sort();
        assert_eq!(evicted, vec!["stale-a".to_string(), "stale-b".to_string()]);
        assert_eq!(registry.session_ids(), vec!["poisoned".to_string()]);

        let session = registry.get_or_create("poisoned", 5);
        assert!(Arc::ptr_eq(&session, &poisoned));
        let smoothed = session.smoothed(2);
        assert_eq!(smoothed.label, MaskLabel::NoMask);
        assert!((smoothed.confidence - 0.6).abs() < 1e-5);

        // 中毒的会话超时后同样会被清理
        clock.advance(Duration::from_secs(300));
        assert_eq!(
            registry.cleanup_inactive_sessions(),
            vec!["poisoned".to_string()]
        );
    }

    #[test]
    fn test_evicted_session_recreated_empty() {
        let (registry, clock) = registry_with_clock();
        let old = registry.get_or_create("s1", 5);
        old.ingest(1, MaskLabel::Mask, 0.9);

        clock.advance(Duration::from_secs(301));
        registry.cleanup_inactive_sessions();

        let new = registry.get_or_create("s1", 5);
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.smoothed(1).label, MaskLabel::Unknown);
    }
}
