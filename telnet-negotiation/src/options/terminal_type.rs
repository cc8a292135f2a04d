//! # Terminal Type Option Implementation (RFC 1091)
//!
//! The Terminal Type option lets a TN5250E client tell the host which 5250
//! device type it is emulating. Unlike a conventional terminal client this
//! implementation only ever plays the client role: the host sends SEND, and
//! this handler answers IS with one of a small list of candidate device
//! types.
//!
//! ## RFC 1091 Summary
//!
//! - **WILL TERMINAL_TYPE**: "I can send my terminal type"
//! - **DO TERMINAL_TYPE**: "Please send your terminal type"
//! - **Sub-negotiation**: Exchange actual terminal type strings
//!
//! ## Sub-negotiation Protocol
//!
//! ```text
//! IAC SB TERMINAL_TYPE SEND IAC SE
//! IAC SB TERMINAL_TYPE IS <device-type-string> IAC SE
//! ```
//!
//! RFC 1091 allows a client to offer a cycling list of terminal types: the
//! host may send SEND again to ask for the next candidate if it didn't like
//! the previous one, and the client is expected to cycle back to its first
//! offering once the list is exhausted, which the host takes as "no more
//! choices, pick the last one you saw". TN5250E hosts use this to let a
//! client offer several 5250 device-type / keyboard combinations and have
//! the host settle on the one it supports.
//!
//! ## Device Types
//!
//! - **IBM-3179-2**: 24x80 color display
//! - **IBM-3196-A1**: 24x80 monochrome display
//! - **IBM-5251-11**: 24x80 monochrome display, older keyboard
//! - **IBM-5291-1**: 24x80 monochrome display
//! - **IBM-5292-2**: 24x80 color display
//! - **IBM-5555-B01**: 24x80 double-byte (DBCS) display
//! - **IBM-5555-C01**: 27x132 double-byte (DBCS) display

use super::{OptionError, SubNegotiationCommand, TelnetOptionHandler};
use crate::protocol::TelnetOption;

/// Terminal Type option handler, specialized for the TN5250E client role
#[derive(Debug, Clone)]
pub struct TerminalTypeOption {
    /// Candidate device types to offer, in preference order
    candidates: Vec<String>,
    /// Index into `candidates` of the type offered most recently
    offered_index: usize,
    /// Whether at least one IS has been sent
    has_offered: bool,
}

/// Terminal information as accepted by a TN5250E host.
///
/// Retained for callers that want to inspect what was offered and detect
/// screen geometry/DBCS-ness from the device type string alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalInfo {
    /// Device type string offered (e.g. "IBM-3179-2")
    pub terminal_type: String,
    /// Capabilities implied by the device type
    pub capabilities: TerminalCapabilities,
}

/// Capabilities implied by a 5250 device type string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCapabilities {
    /// Screen rows
    pub rows: u16,
    /// Screen columns
    pub cols: u16,
    /// Double-byte character set device
    pub dbcs: bool,
    /// Color-capable display
    pub color: bool,
}

impl TerminalTypeOption {
    /// Create a handler that will offer `candidates` in order, cycling back
    /// to the first once exhausted. Panics if `candidates` is empty.
    pub fn new(candidates: Vec<String>) -> Self {
        assert!(
            !candidates.is_empty(),
            "terminal type negotiation requires at least one candidate device type"
        );
        Self {
            candidates,
            offered_index: 0,
            has_offered: false,
        }
    }

    /// Default candidate list: a 24x80 color display first, falling back to
    /// monochrome and older keyboard variants.
    pub fn with_default_candidates() -> Self {
        Self::new(vec![
            "IBM-3179-2".to_string(),
            "IBM-5292-2".to_string(),
            "IBM-3196-A1".to_string(),
            "IBM-5291-1".to_string(),
            "IBM-5251-11".to_string(),
        ])
    }

    /// Device type string most recently offered to the host
    pub fn offered_type(&self) -> Option<&str> {
        if self.has_offered {
            self.candidates.get(self.offered_index).map(|s| s.as_str())
        } else {
            None
        }
    }

    /// Capabilities implied by the most recently offered device type
    pub fn offered_capabilities(&self) -> Option<TerminalCapabilities> {
        self.offered_type().map(Self::capabilities_for)
    }

    /// Whether the candidate cycle has wrapped back to its first entry,
    /// meaning the host should treat this as the final answer.
    pub fn has_cycled(&self) -> bool {
        self.has_offered && self.offered_index == 0 && self.candidates.len() > 1
    }

    fn capabilities_for(device_type: &str) -> TerminalCapabilities {
        let dbcs = device_type.starts_with("IBM-5555");
        let (rows, cols) = if device_type == "IBM-5555-C01" {
            (27, 132)
        } else {
            (24, 80)
        };
        let color = matches!(device_type, "IBM-3179-2" | "IBM-5292-2");
        TerminalCapabilities {
            rows,
            cols,
            dbcs,
            color,
        }
    }

    fn advance(&mut self) -> &str {
        if self.has_offered {
            self.offered_index = (self.offered_index + 1) % self.candidates.len();
        }
        self.has_offered = true;
        &self.candidates[self.offered_index]
    }
}

impl TelnetOptionHandler for TerminalTypeOption {
    fn option_code(&self) -> TelnetOption {
        TelnetOption::TERMINAL_TYPE
    }

    fn handle_subnegotiation(&mut self, data: &[u8]) -> Result<Vec<u8>, OptionError> {
        if data.is_empty() {
            return Err(OptionError::InvalidData(
                "Empty terminal type data".to_string(),
            ));
        }

        match data[0] {
            // SEND (1): host wants the next candidate device type.
            1 => {
                let device_type = self.advance().to_string();
                let mut response = vec![0u8]; // IS
                response.extend_from_slice(device_type.as_bytes());
                Ok(response)
            }

            // IS (0): only meaningful if a host were replaying our own
            // offer back; nothing to act on.
            0 => Ok(vec![]),

            cmd => Err(OptionError::UnsupportedCommand(cmd)),
        }
    }

    fn generate_subnegotiation(
        &self,
        command: SubNegotiationCommand,
    ) -> Result<Vec<u8>, OptionError> {
        match command {
            SubNegotiationCommand::Send => Ok(vec![1]), // SEND command
            SubNegotiationCommand::Is => {
                let device_type = self
                    .offered_type()
                    .unwrap_or(&self.candidates[0])
                    .to_string();
                let mut data = vec![0u8]; // IS command
                data.extend_from_slice(device_type.as_bytes());
                Ok(data)
            }
        }
    }

    fn is_active(&self) -> bool {
        self.has_offered
    }

    fn reset(&mut self) {
        self.offered_index = 0;
        self.has_offered = false;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Default for TerminalTypeOption {
    fn default() -> Self {
        Self::with_default_candidates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_first_candidate_on_first_send() {
        let mut opt = TerminalTypeOption::with_default_candidates();
        let response = opt.handle_subnegotiation(&[1]).unwrap();
        assert_eq!(response[0], 0);
        assert_eq!(&response[1..], b"IBM-3179-2");
        assert_eq!(opt.offered_type(), Some("IBM-3179-2"));
    }

    #[test]
    fn cycles_through_candidates_on_repeated_send() {
        let mut opt = TerminalTypeOption::new(vec!["A".to_string(), "B".to_string()]);
        opt.handle_subnegotiation(&[1]).unwrap();
        assert_eq!(opt.offered_type(), Some("A"));
        opt.handle_subnegotiation(&[1]).unwrap();
        assert_eq!(opt.offered_type(), Some("B"));
        opt.handle_subnegotiation(&[1]).unwrap();
        assert_eq!(opt.offered_type(), Some("A"));
        assert!(opt.has_cycled());
    }

    #[test]
    fn capabilities_reflect_dbcs_device() {
        let mut opt = TerminalTypeOption::new(vec!["IBM-5555-C01".to_string()]);
        opt.handle_subnegotiation(&[1]).unwrap();
        let caps = opt.offered_capabilities().unwrap();
        assert!(caps.dbcs);
        assert_eq!((caps.rows, caps.cols), (27, 132));
    }

    #[test]
    fn generate_send_and_is() {
        let mut opt = TerminalTypeOption::with_default_candidates();
        assert_eq!(
            opt.generate_subnegotiation(SubNegotiationCommand::Send)
                .unwrap(),
            vec![1]
        );
        opt.handle_subnegotiation(&[1]).unwrap();
        let is = opt.generate_subnegotiation(SubNegotiationCommand::Is).unwrap();
        assert_eq!(is[0], 0);
        assert_eq!(&is[1..], b"IBM-3179-2");
    }

    #[test]
    fn reset_restarts_cycle() {
        let mut opt = TerminalTypeOption::with_default_candidates();
        opt.handle_subnegotiation(&[1]).unwrap();
        opt.handle_subnegotiation(&[1]).unwrap();
        opt.reset();
        assert!(!opt.is_active());
        assert!(opt.offered_type().is_none());
    }

    #[test]
    #[should_panic]
    fn empty_candidate_list_panics() {
        TerminalTypeOption::new(vec![]);
    }
}
