//! Per-process WhatsApp session sequencer (C4 invariant #6): at most one
//! outbound send per session key in flight at a time, followed by a
//! mandatory inter-message delay before the next send on that same
//! session is allowed to start.
//!
//! This guarantee is per-process only. There is no distributed lock —
//! a single worker instance is always assigned each session's traffic
//! by the bus's deliver-group partitioning, so a process-local mutex
//! is sufficient.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_SESSION_KEY: &str = "default";

/// Derives the session key a message's sends are serialized under:
/// an explicit session name if the message carries one, else
/// `"site:{site_id}"`, else the fixed default key.
pub fn session_key(explicit: Option<&str>, site_id: &str) -> String {
    if let Some(name) = explicit.filter(|s| !s.is_empty()) {
        return name.to_string();
    }
    if !site_id.is_empty() {
        return format!("site:{site_id}");
    }
    DEFAULT_SESSION_KEY.to_string()
}

struct SessionState {
    lock: Mutex<()>,
    last_send_at: Mutex<Option<Instant>>,
}

/// Serializes sends per WhatsApp session and enforces a minimum delay
/// between consecutive sends on the same session.
pub struct SessionSequencer {
    sessions: DashMap<String, Arc<SessionState>>,
    min_interval: Duration,
}

impl SessionSequencer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            min_interval,
        }
    }

    fn state_for(&self, key: &str) -> Arc<SessionState> {
        self.sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(SessionState {
                    lock: Mutex::new(()),
                    last_send_at: Mutex::new(None),
                })
            })
            .clone()
    }

    /// Runs `op` with exclusive access to `key`'s session, waiting out
    /// any mandatory delay left over from the previous send first, and
    /// starting the next delay window only after `op` completes —
    /// success or failure.
    pub async fn run<F, Fut, T>(&self, key: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let state = self.state_for(key);
        let _guard = state.lock.lock().await;

        let wait = {
            let last = state.last_send_at.lock().await;
            last.map(|t| self.min_interval.saturating_sub(t.elapsed()))
                .unwrap_or(Duration::ZERO)
        };
        if !wait.is_zero() {
            debug!(session = key, delay_ms = wait.as_millis() as u64, "session sequencer delay");
            tokio::time::sleep(wait).await;
        }

        let result = op().await;

        *state.last_send_at.lock().await = Some(Instant::now());
        result
    }
}

impl Default for SessionSequencer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn session_key_prefers_explicit_name() {
        assert_eq!(session_key(Some("conv-42"), "site-a"), "conv-42");
    }

    #[test]
    fn session_key_falls_back_to_site() {
        assert_eq!(session_key(None, "site-a"), "site:site-a");
    }

    #[test]
    fn session_key_falls_back_to_default() {
        assert_eq!(session_key(None, ""), "default");
    }

    #[tokio::test]
    async fn serializes_concurrent_sends_on_same_session() {
        let sequencer = Arc::new(SessionSequencer::new(Duration::from_millis(20)));
        let concurrent = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let sequencer = sequencer.clone();
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                sequencer
                    .run("session-a", || async {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_concurrent.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_sessions_do_not_block_each_other() {
        let sequencer = SessionSequencer::new(Duration::from_secs(10));
        let start = Instant::now();
        let a = sequencer.run("session-a", || async { 1 });
        let b = sequencer.run("session-b", || async { 2 });
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!((ra, rb), (1, 2));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn enforces_minimum_delay_between_sends() {
        let sequencer = SessionSequencer::new(Duration::from_millis(50));
        sequencer.run("session-a", || async { }).await;
        let start = Instant::now();
        sequencer.run("session-a", || async { }).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
