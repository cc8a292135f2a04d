//! Session Pool (C9): bounds concurrent `Session`s and arbitrates
//! acquisition order (FIFO by default, LIFO via configuration).

use crate::config::{EngineConfig, QueuePolicy, SessionConfig};
use crate::error::{TermError, TermResult};
use crate::session::Session;

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct PoolState {
    idle: VecDeque<Session>,
    reserved: usize,
    closed: bool,
}

/// A bounded multiset of `Session`s shared across callers. The invariant
/// `|reserved| + |idle| <= max_sessions` holds at every instant, and
/// `acquire` never hands out a session already held by another caller.
pub struct SessionPool {
    session_template: SessionConfig,
    queue_policy: QueuePolicy,
    max_sessions: usize,
    state: Mutex<PoolState>,
    condvar: Condvar,
}

impl SessionPool {
    pub fn new(engine: &EngineConfig, session_template: SessionConfig) -> Self {
        Self {
            session_template,
            queue_policy: engine.queue_policy,
            max_sessions: engine.max_sessions,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                reserved: 0,
                closed: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Acquire a session, blocking up to `timeout` if the pool is
    /// saturated. Returns an idle session if one is available, otherwise
    /// creates a fresh (unconnected) one while the pool has headroom.
    pub fn acquire(&self, timeout: Duration) -> TermResult<Session> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();

        loop {
            if state.closed {
                return Err(TermError::PoolClosed);
            }

            let idle_session = match self.queue_policy {
                QueuePolicy::Fifo => state.idle.pop_front(),
                QueuePolicy::Lifo => state.idle.pop_back(),
            };
            if let Some(session) = idle_session {
                state.reserved += 1;
                eprintln!("[pool] acquired idle session; reserved={}", state.reserved);
                return Ok(session);
            }

            if state.reserved + state.idle.len() < self.max_sessions {
                state.reserved += 1;
                eprintln!("[pool] created new session; reserved={}", state.reserved);
                return Ok(Session::new(self.session_template.clone()));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TermError::PoolAcquireTimeout);
            }
            state = self.condvar.wait_timeout(state, remaining).unwrap().0;
        }
    }

    /// Return a session to the pool. If the pool has been shut down, the
    /// session is disconnected and dropped instead of returned to idle.
    pub fn release(&self, mut session: Session) {
        let mut state = self.state.lock().unwrap();
        state.reserved = state.reserved.saturating_sub(1);
        if state.closed {
            let _ = session.disconnect();
        } else {
            state.idle.push_back(session);
        }
        self.condvar.notify_one();
    }

    /// Disconnect every idle session, mark the pool closed, and reject
    /// further acquisition. Sessions still checked out are disconnected
    /// when their caller calls `release`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        while let Some(mut session) = state.idle.pop_front() {
            let _ = session.disconnect();
        }
        eprintln!("[pool] shut down");
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn template() -> (EngineConfig, SessionConfig) {
        let engine = EngineConfig {
            max_sessions: 2,
            ..EngineConfig::default()
        };
        let session = engine.session_template();
        (engine, session)
    }

    #[test]
    fn acquire_reuses_released_sessions() {
        let (engine, session_config) = template();
        let pool = SessionPool::new(&engine, session_config);

        let session = pool.acquire(Duration::from_millis(500)).unwrap();
        pool.release(session);
        assert!(pool.acquire(Duration::from_millis(500)).is_ok());
    }

    #[test]
    fn three_concurrent_acquires_at_capacity_two_yield_one_times_out() {
        let (engine, session_config) = template();
        let pool = Arc::new(SessionPool::new(&engine, session_config));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || pool.acquire(Duration::from_millis(1000)).is_ok())
            })
            .collect();

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|&&ok| ok).count(), 2);
        assert_eq!(results.iter().filter(|&&ok| !ok).count(), 1);
    }

    #[test]
    fn shutdown_rejects_further_acquisition() {
        let (engine, session_config) = template();
        let pool = SessionPool::new(&engine, session_config);
        let session = pool.acquire(Duration::from_millis(500)).unwrap();
        pool.release(session);
        pool.shutdown();

        let result = pool.acquire(Duration::from_millis(100));
        assert!(matches!(result, Err(TermError::PoolClosed)));
    }
}
