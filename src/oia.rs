//! Operator Information Area (C7): the terminal's status-line state vector,
//! tracked independently of the presentation space.

/// The OIA state vector. Each field mirrors one indicator a physical 5250
/// terminal would show on its status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Oia {
    pub input_inhibited: bool,
    pub keyboard_locked: bool,
    pub message_wait: bool,
    pub insert_mode: bool,
    pub system_wait: bool,
    pub script_active: bool,
    pub alarm_pending: bool,
    pub communication_error_code: Option<u16>,
}

impl Oia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether input may currently be sent to the host: neither inhibited
    /// nor locked nor waiting on the system.
    pub fn accepts_input(&self) -> bool {
        !self.input_inhibited && !self.keyboard_locked && !self.system_wait
    }
}

/// Callback invoked whenever [`OiaTracker::apply`] changes the OIA state.
pub trait OiaListener: Send {
    fn on_oia_change(&mut self, previous: Oia, current: Oia);
}

/// Owns the current [`Oia`] and notifies registered listeners on change.
pub struct OiaTracker {
    state: Oia,
    listeners: Vec<Box<dyn OiaListener>>,
}

impl OiaTracker {
    pub fn new() -> Self {
        Self {
            state: Oia::default(),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> Oia {
        self.state
    }

    pub fn add_listener(&mut self, listener: Box<dyn OiaListener>) {
        self.listeners.push(listener);
    }

    /// Replace the OIA state wholesale, notifying listeners only if
    /// anything actually changed.
    pub fn apply(&mut self, new_state: Oia) {
        if new_state == self.state {
            return;
        }
        let previous = self.state;
        self.state = new_state;
        for listener in &mut self.listeners {
            listener.on_oia_change(previous, new_state);
        }
    }

    pub fn set_input_inhibited(&mut self, value: bool) {
        let mut next = self.state;
        next.input_inhibited = value;
        self.apply(next);
    }

    pub fn set_keyboard_locked(&mut self, value: bool) {
        let mut next = self.state;
        next.keyboard_locked = value;
        self.apply(next);
    }

    pub fn set_communication_error(&mut self, code: Option<u16>) {
        let mut next = self.state;
        next.communication_error_code = code;
        self.apply(next);
    }
}

impl Default for OiaTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingListener {
        changes: Arc<Mutex<Vec<(Oia, Oia)>>>,
    }

    impl OiaListener for RecordingListener {
        fn on_oia_change(&mut self, previous: Oia, current: Oia) {
            self.changes.lock().unwrap().push((previous, current));
        }
    }

    #[test]
    fn default_state_accepts_input() {
        assert!(Oia::default().accepts_input());
    }

    #[test]
    fn input_inhibited_blocks_input_acceptance() {
        let mut oia = Oia::default();
        oia.input_inhibited = true;
        assert!(!oia.accepts_input());
    }

    #[test]
    fn apply_notifies_listener_only_on_real_change() {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = OiaTracker::new();
        tracker.add_listener(Box::new(RecordingListener {
            changes: changes.clone(),
        }));

        tracker.set_input_inhibited(true);
        tracker.set_input_inhibited(true);
        tracker.set_keyboard_locked(true);

        assert_eq!(changes.lock().unwrap().len(), 2);
    }

    #[test]
    fn communication_error_code_round_trips() {
        let mut tracker = OiaTracker::new();
        tracker.set_communication_error(Some(0x2040));
        assert_eq!(tracker.state().communication_error_code, Some(0x2040));
        tracker.set_communication_error(None);
        assert_eq!(tracker.state().communication_error_code, None);
    }

    #[test]
    fn system_wait_blocks_input_acceptance() {
        let mut tracker = OiaTracker::new();
        let mut next = tracker.state();
        next.system_wait = true;
        tracker.apply(next);
        assert!(!tracker.state().accepts_input());
    }
}
