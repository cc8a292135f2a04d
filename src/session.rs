//! Session (C9): the caller-facing automation handle for one 5250
//! connection, orchestrating transport, producer, virtual terminal, and
//! evidence recording.

use crate::config::SessionConfig;
use crate::error::{TermError, TermResult};
use crate::evidence::EvidenceRecorder;
use crate::field::Field;
use crate::keys::{self, Aid, KeyAction};
use crate::oia::Oia;
use crate::producer::{Producer, ProducerEvent, DEFAULT_QUEUE_CAPACITY};
use crate::transport::Transport;
use crate::vt::VirtualTerminal;
use crate::wait::{self, WaitHistory, WaitPredicate};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cooperative cancellation flag shared between the caller and a
/// suspending operation such as `wait_for`. Cheap to clone; all clones
/// observe the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Takes effect the next time the suspended
    /// operation checks the token, not immediately.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Negotiating,
    Connected,
    Reading,
    Locked,
    Error,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionChangeEvent {
    pub previous: SessionState,
    pub current: SessionState,
}

#[derive(Debug, Clone)]
pub struct SessionConfigEvent {
    pub device_name: Option<String>,
}

pub trait SessionListener: Send {
    fn on_state_change(&mut self, _event: SessionChangeEvent) {}
    fn on_config_change(&mut self, _event: SessionConfigEvent) {}
}

/// A deep, immutable copy of a session's presentation space at the moment
/// of `capture()`.
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub rows: u16,
    pub cols: u16,
    pub text: String,
    pub oia: Oia,
    pub fields: Vec<Field>,
}

impl ScreenSnapshot {
    pub fn text_contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }
}

/// How often `wait_for` re-checks its predicate against freshly pumped
/// producer events.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Session {
    config: SessionConfig,
    state: SessionState,
    transport_device_name: Option<String>,
    producer: Option<Producer>,
    vt: Option<VirtualTerminal>,
    evidence: Option<EvidenceRecorder>,
    listeners: Vec<Box<dyn SessionListener>>,
    wait_history: WaitHistory,
    step_counter: u64,
    debug_logging: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Unconnected,
            transport_device_name: None,
            producer: None,
            vt: None,
            evidence: None,
            listeners: Vec::new(),
            wait_history: WaitHistory::default(),
            step_counter: 0,
            debug_logging: false,
        }
    }

    /// Build a `Session` already in the `Connected` state around a given
    /// `VirtualTerminal`, with no producer. Used by this module's tests to
    /// exercise `send_keys`/`wait_for` behavior without a real socket.
    #[cfg(test)]
    fn for_test(config: SessionConfig, vt: VirtualTerminal) -> Self {
        Self {
            config,
            state: SessionState::Connected,
            transport_device_name: None,
            producer: None,
            vt: Some(vt),
            evidence: None,
            listeners: Vec::new(),
            wait_history: WaitHistory::default(),
            step_counter: 0,
            debug_logging: false,
        }
    }

    /// Attach an evidence recorder writing to `dir` under `session_id`. Must
    /// be called before `connect()` to capture the connection step itself.
    pub fn with_evidence_dir(
        mut self,
        dir: impl Into<PathBuf>,
        session_id: impl Into<String>,
    ) -> std::io::Result<Self> {
        self.evidence = Some(EvidenceRecorder::new(dir.into(), session_id.into())?);
        Ok(self)
    }

    pub fn add_listener(&mut self, listener: Box<dyn SessionListener>) {
        self.listeners.push(listener);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_debug_logging(&mut self, enabled: bool) -> TermResult<()> {
        self.debug_logging = enabled;
        Ok(())
    }

    pub fn allocated_device_name(&self) -> Option<&str> {
        self.transport_device_name.as_deref()
    }

    fn next_step_id(&mut self) -> String {
        self.step_counter += 1;
        format!("step-{}", self.step_counter)
    }

    fn transition(&mut self, next: SessionState) {
        if next == self.state {
            return;
        }
        let previous = self.state;
        self.state = next;
        for listener in &mut self.listeners {
            listener.on_state_change(SessionChangeEvent {
                previous,
                current: next,
            });
        }
    }

    /// Idempotent: a second `connect()` on an already-connected session is
    /// a no-op.
    pub fn connect(&mut self) -> TermResult<()> {
        if matches!(
            self.state,
            SessionState::Connected | SessionState::Reading | SessionState::Locked
        ) {
            return Ok(());
        }

        self.config.validate()?;
        self.transition(SessionState::Negotiating);
        eprintln!("[session] connecting to {}:{}", self.config.host, self.config.port);

        let transport = match Transport::connect(&self.config) {
            Ok(t) => t,
            Err(e) => {
                self.transition(SessionState::Error);
                return Err(e);
            }
        };
        self.transport_device_name = transport.allocated_device_name().map(str::to_string);

        let vt = match VirtualTerminal::new(self.config.screen_size, self.config.ccsid) {
            Ok(vt) => vt,
            Err(e) => {
                self.transition(SessionState::Error);
                return Err(e);
            }
        };
        self.vt = Some(vt);
        self.producer = Some(Producer::spawn(transport, DEFAULT_QUEUE_CAPACITY));

        self.transition(SessionState::Connected);
        if let Some(evidence) = &mut self.evidence {
            evidence.record_step("connect", "connected");
        }
        eprintln!("[session] connected; device_name={:?}", self.transport_device_name);
        Ok(())
    }

    /// Idempotent: a second `disconnect()` is a no-op.
    pub fn disconnect(&mut self) -> TermResult<()> {
        if matches!(self.state, SessionState::Closed | SessionState::Unconnected) {
            return Ok(());
        }
        if let Some(mut producer) = self.producer.take() {
            producer.shutdown();
        }
        self.vt = None;
        self.transition(SessionState::Closed);
        if let Some(evidence) = &mut self.evidence {
            evidence.record_step("disconnect", "closed");
            let _ = evidence.flush();
        }
        eprintln!("[session] disconnected");
        Ok(())
    }

    fn require_connected(&self) -> TermResult<()> {
        match self.state {
            SessionState::Connected | SessionState::Reading | SessionState::Locked => Ok(()),
            _ => Err(TermError::SessionError(
                "session is not connected".to_string(),
            )),
        }
    }

    fn vt_mut(&mut self) -> TermResult<&mut VirtualTerminal> {
        self.vt
            .as_mut()
            .ok_or_else(|| TermError::SessionError("session has no active terminal".to_string()))
    }

    /// Write a per-step screen dump to the evidence recorder, if one is
    /// attached. A no-op (not an error) when there is no active terminal or
    /// no evidence recorder — evidence is best-effort instrumentation, not a
    /// precondition for the call that triggered it.
    fn snapshot_evidence(&mut self, step_id: &str) {
        if let (Some(vt), Some(evidence)) = (&self.vt, &mut self.evidence) {
            let _ = evidence.snapshot(step_id, vt.screen(), &vt.oia(), vt.fields());
        }
    }

    /// Drain at most one event from the producer and apply it, waiting up
    /// to `timeout`. Returns `true` if a record was applied.
    fn pump(&mut self, timeout: Duration) -> TermResult<bool> {
        let event = match &self.producer {
            Some(producer) => producer.recv_timeout(timeout),
            None => return Ok(false),
        };
        match event {
            Some(ProducerEvent::Record(record)) => {
                self.vt_mut()?.apply_record(&record)?;
                Ok(true)
            }
            Some(ProducerEvent::Eof) => {
                self.transition(SessionState::Closed);
                Ok(false)
            }
            Some(ProducerEvent::Error(e)) => {
                self.transition(SessionState::Error);
                Err(e)
            }
            None => Ok(false),
        }
    }

    /// Parse and apply a `send_keys` string: text is written into fields in
    /// tab order starting from the current field, and a trailing AID (if
    /// present) is transmitted. Fails with `InputInhibited` if the OIA is
    /// locked. See [`Self::send_keys_queue_until_unlock`] to block instead.
    pub fn send_keys(&mut self, input: &str) -> TermResult<()> {
        self.require_connected()?;
        let oia = self.vt_mut()?.oia();
        if !oia.accepts_input() {
            return Err(TermError::InputInhibited);
        }
        self.send_keys_inner(input)
    }

    /// As [`Self::send_keys`], but if the OIA is locked, blocks (polling the
    /// producer, same as `wait_for`) until it unlocks or the session's
    /// configured read timeout elapses, instead of failing immediately.
    pub fn send_keys_queue_until_unlock(&mut self, input: &str) -> TermResult<()> {
        self.require_connected()?;
        let deadline = Instant::now() + self.config.read_timeout();
        loop {
            let oia = self.vt_mut()?.oia();
            if oia.accepts_input() {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TermError::InputInhibited);
            }
            self.pump(remaining.min(WAIT_POLL_INTERVAL))?;
        }
        self.send_keys_inner(input)
    }

    fn send_keys_inner(&mut self, input: &str) -> TermResult<()> {
        let actions = keys::parse_keys(input)?;
        keys::validate_single_aid(&actions)?;

        let fields = self.vt_mut()?.fields().to_vec();
        let mut pending: HashMap<usize, String> = HashMap::new();
        let mut current = 0usize;
        let mut trailing_aid: Option<Aid> = None;

        for action in &actions {
            match action {
                KeyAction::Char(c) => {
                    if !fields.is_empty() {
                        pending.entry(current).or_default().push(*c);
                    }
                }
                KeyAction::Tab => {
                    if !fields.is_empty() {
                        current = (current + 1) % fields.len();
                    }
                }
                KeyAction::BackTab => {
                    if !fields.is_empty() {
                        current = (current + fields.len() - 1) % fields.len();
                    }
                }
                KeyAction::Home => current = 0,
                KeyAction::EraseToEndOfField => {
                    pending.insert(current, String::new());
                }
                KeyAction::Up | KeyAction::Down | KeyAction::Left | KeyAction::Right => {}
                KeyAction::Aid(aid) => trailing_aid = Some(*aid),
            }
        }

        for (idx, text) in &pending {
            if let Some(field) = fields.get(*idx) {
                let vt = self.vt_mut()?;
                crate::field::set_field(vt.screen_mut(), field, text)?;
                vt.mark_modified(field.attr_pos);
            }
        }

        self.step_counter += 1;
        if let Some(evidence) = &mut self.evidence {
            let step_id = format!("keys-{}", self.step_counter);
            evidence.record_keystrokes(&step_id, input);
        }

        if let Some(aid) = trailing_aid {
            let reply = self.vt_mut()?.assemble_reply(aid)?;
            if let Some(producer) = &self.producer {
                producer.write_record(reply);
            }
        }

        Ok(())
    }

    /// Block (cooperatively, via producer polling) until `predicate` holds
    /// or `timeout` elapses. Not cancellable; see
    /// [`Self::wait_for_cancellable`] for a variant that is.
    pub fn wait_for(&mut self, predicate: WaitPredicate, timeout: Duration) -> TermResult<()> {
        self.wait_for_cancellable(predicate, timeout, &CancellationToken::new())
    }

    /// As [`Self::wait_for`], but `token.cancel()` from another thread
    /// causes the next poll iteration to return `Cancelled` instead of
    /// continuing to wait. The VT is never left mid-frame: cancellation is
    /// only observed between complete record applications.
    pub fn wait_for_cancellable(
        &mut self,
        predicate: WaitPredicate,
        timeout: Duration,
        token: &CancellationToken,
    ) -> TermResult<()> {
        self.require_connected()?;
        let step_id = self.next_step_id();
        if let Some(evidence) = &mut self.evidence {
            evidence.record_step(&step_id, "wait_start");
        }
        self.snapshot_evidence(&step_id);

        let deadline = Instant::now() + timeout;
        loop {
            if token.is_cancelled() {
                if let Some(evidence) = &mut self.evidence {
                    evidence.record_failure(&step_id, "cancelled");
                }
                self.snapshot_evidence(&step_id);
                return Err(TermError::Cancelled);
            }

            {
                let oia = self.vt_mut()?.oia();
                self.wait_history.observe(&oia);
                let history = self.wait_history;
                let vt = self.vt_mut()?;
                if wait::evaluate(&predicate, vt.screen(), &oia, vt.fields(), &history) {
                    if let Some(evidence) = &mut self.evidence {
                        evidence.record_step(&step_id, "wait_end");
                    }
                    self.snapshot_evidence(&step_id);
                    return Ok(());
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let elapsed_ms = timeout.as_millis() as u64;
                let detail = format!("{predicate:?}");
                if let Some(evidence) = &mut self.evidence {
                    evidence.record_failure(&step_id, &detail);
                }
                self.snapshot_evidence(&step_id);
                return Err(TermError::WaitTimeout {
                    predicate: detail,
                    elapsed_ms,
                });
            }

            let poll = remaining.min(WAIT_POLL_INTERVAL);
            self.pump(poll)?;
        }
    }

    pub fn capture(&self) -> TermResult<ScreenSnapshot> {
        let vt = self
            .vt
            .as_ref()
            .ok_or_else(|| TermError::SessionError("session has no active terminal".to_string()))?;
        Ok(ScreenSnapshot {
            rows: vt.screen().rows(),
            cols: vt.screen().cols(),
            text: vt.screen().to_text(),
            oia: vt.oia(),
            fields: vt.fields().to_vec(),
        })
    }

    pub fn read_field(&self, selector: usize) -> TermResult<String> {
        let vt = self
            .vt
            .as_ref()
            .ok_or_else(|| TermError::SessionError("session has no active terminal".to_string()))?;
        let field = vt
            .fields()
            .get(selector)
            .ok_or_else(|| TermError::SessionError(format!("no field at index {selector}")))?;
        Ok(crate::field::copy_field_to_string(vt.screen(), field))
    }

    /// Write `value` into the field at `selector`. Returns the number of
    /// characters accepted (truncated to the field's length).
    pub fn write_field(&mut self, selector: usize, value: &str) -> TermResult<usize> {
        self.require_connected()?;
        let vt = self.vt_mut()?;
        let field = *vt
            .fields()
            .get(selector)
            .ok_or_else(|| TermError::SessionError(format!("no field at index {selector}")))?;
        let accepted = crate::field::set_field(vt.screen_mut(), &field, value)?;
        vt.mark_modified(field.attr_pos);
        Ok(accepted)
    }

    pub fn signal_bell(&mut self) -> TermResult<()> {
        let vt = self.vt_mut()?;
        let mut oia = vt.oia();
        oia.alarm_pending = true;
        vt.oia_tracker_mut().apply(oia);
        eprintln!("[session] bell signaled");
        Ok(())
    }

    /// Invoke `handler` with the current screen, per the SYSREQ/F3 handler
    /// contract: `None` means "return to menu", `Some(selection)` means the
    /// handler chose an option.
    pub fn handle_system_request<F>(&mut self, handler: F) -> TermResult<Option<String>>
    where
        F: FnOnce(&ScreenSnapshot) -> Option<String>,
    {
        let snapshot = self.capture()?;
        Ok(handler(&snapshot))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use std::thread;

    #[test]
    fn new_session_starts_unconnected() {
        let session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[test]
    fn send_keys_before_connect_is_a_session_error() {
        let mut session = Session::new(SessionConfig::default());
        let result = session.send_keys("[enter]");
        assert!(matches!(result, Err(TermError::SessionError(_))));
    }

    #[test]
    fn disconnect_before_connect_is_a_noop() {
        let mut session = Session::new(SessionConfig::default());
        assert!(session.disconnect().is_ok());
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[test]
    fn connect_to_unreachable_host_surfaces_error_state() {
        let mut config = SessionConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 1;
        config.connect_timeout_ms = 200;
        let mut session = Session::new(config);
        assert!(session.connect().is_err());
        assert_eq!(session.state(), SessionState::Error);
    }

    fn locked_test_session(read_timeout_ms: u64) -> Session {
        let mut vt = VirtualTerminal::new(SessionConfig::default().screen_size, 37).unwrap();
        vt.oia_tracker_mut().set_keyboard_locked(true);
        let mut config = SessionConfig::default();
        config.read_timeout_ms = read_timeout_ms;
        Session::for_test(config, vt)
    }

    #[test]
    fn send_keys_fails_immediately_when_locked_by_default() {
        let mut session = locked_test_session(5_000);
        let start = Instant::now();
        let result = session.send_keys("[enter]");
        assert!(matches!(result, Err(TermError::InputInhibited)));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn send_keys_queue_until_unlock_waits_then_times_out_inhibited() {
        let mut session = locked_test_session(250);
        let result = session.send_keys_queue_until_unlock("[enter]");
        assert!(matches!(result, Err(TermError::InputInhibited)));
    }

    #[test]
    fn wait_for_cancellable_returns_cancelled_when_token_cancelled() {
        let mut vt = VirtualTerminal::new(SessionConfig::default().screen_size, 37).unwrap();
        vt.oia_tracker_mut().set_keyboard_locked(true);
        let mut session = Session::for_test(SessionConfig::default(), vt);

        let token = CancellationToken::new();
        let cancel_token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel_token.cancel();
        });

        let result = session.wait_for_cancellable(
            WaitPredicate::KeyboardUnlock,
            Duration::from_secs(5),
            &token,
        );
        assert!(matches!(result, Err(TermError::Cancelled)));
    }
}
