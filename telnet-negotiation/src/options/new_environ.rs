//! # New Environment Option Implementation (RFC 1571)
//!
//! The New Environment option carries name/value pairs between client and
//! server. TN5250E uses it exclusively to carry the requested device name
//! (and, optionally, the requesting user) during session establishment —
//! there is no separate TN5250E-specific subnegotiation for this; RFC 1571
//! is the whole mechanism.
//!
//! ## RFC 1571 Summary
//!
//! - **WILL NEW_ENVIRON**: "I can send environment variables"
//! - **DO NEW_ENVIRON**: "Please send environment variables"
//! - **Sub-negotiation**: `IAC SB NEW-ENVIRON SEND ... IAC SE` followed by
//!   `IAC SB NEW-ENVIRON IS ... IAC SE`
//!
//! ## Sub-negotiation Protocol
//!
//! ```text
//! IAC SB NEW-ENVIRON SEND IAC SE                      -- host asks for everything
//! IAC SB NEW-ENVIRON IS VAR "DEVNAME" VALUE "D1" IAC SE -- client answers
//! ```
//!
//! `VAR` (0) introduces a variable name, `VALUE` (1) introduces its value,
//! `ESC` (2) escapes a literal VAR/VALUE/ESC/USERVAR byte inside a name or
//! value, and `USERVAR` (3) introduces a user-defined variable name (used
//! here to carry `USER`). TN5250E hosts look specifically for a variable
//! named `DEVNAME`; everything else in the exchange is ignored by this
//! implementation.

use super::{OptionError, SubNegotiationCommand, TelnetOptionHandler};
use crate::protocol::TelnetOption;

const VAR: u8 = 0;
const VALUE: u8 = 1;
const ESC: u8 = 2;
const USERVAR: u8 = 3;

/// New Environment option handler, specialized for TN5250E device-name exchange
#[derive(Debug, Clone)]
pub struct NewEnvironOption {
    /// Device name this client will offer when the host asks
    requested_device_name: Option<String>,
    /// Optional user name to offer alongside the device name
    requested_user: Option<String>,
    /// Device name the host actually allocated (parsed from a SEND that
    /// echoes back what was accepted, if the host does so)
    allocated_device_name: Option<String>,
    /// Whether a SEND/IS round has completed
    negotiated: bool,
}

impl NewEnvironOption {
    /// Create a handler with no device name configured yet
    pub fn new() -> Self {
        Self {
            requested_device_name: None,
            requested_user: None,
            allocated_device_name: None,
            negotiated: false,
        }
    }

    /// Configure the device name (and optional user) to offer to the host
    pub fn set_requested(&mut self, device_name: Option<String>, user: Option<String>) {
        self.requested_device_name = device_name;
        self.requested_user = user;
    }

    pub fn requested_device_name(&self) -> Option<&str> {
        self.requested_device_name.as_deref()
    }

    pub fn allocated_device_name(&self) -> Option<&str> {
        self.allocated_device_name.as_deref()
    }

    pub fn has_negotiated(&self) -> bool {
        self.negotiated
    }

    /// Encode one VAR/VALUE pair, escaping any VAR/VALUE/ESC/USERVAR bytes in
    /// the name or value per RFC 1571 section 2.
    fn encode_pair(out: &mut Vec<u8>, name: &str, value: &str) {
        out.push(VAR);
        Self::encode_escaped(out, name.as_bytes());
        out.push(VALUE);
        Self::encode_escaped(out, value.as_bytes());
    }

    fn encode_escaped(out: &mut Vec<u8>, bytes: &[u8]) {
        for &b in bytes {
            if matches!(b, VAR | VALUE | ESC | USERVAR) {
                out.push(ESC);
            }
            out.push(b);
        }
    }

    /// Parse a SEND body (RFC 1571: a possibly-empty list of VAR/USERVAR
    /// names, with no VALUE parts, meaning "send me everything you have" when
    /// empty).
    fn parse_send(data: &[u8]) -> Vec<String> {
        let mut names = Vec::new();
        let mut i = 0;
        while i < data.len() {
            match data[i] {
                VAR | USERVAR => {
                    i += 1;
                    let (name, next) = Self::read_escaped_token(data, i);
                    if !name.is_empty() {
                        names.push(name);
                    }
                    i = next;
                }
                _ => i += 1,
            }
        }
        names
    }

    /// Read bytes until the next unescaped VAR/VALUE/USERVAR marker.
    fn read_escaped_token(data: &[u8], start: usize) -> (String, usize) {
        let mut bytes = Vec::new();
        let mut i = start;
        while i < data.len() {
            match data[i] {
                ESC if i + 1 < data.len() => {
                    bytes.push(data[i + 1]);
                    i += 2;
                }
                VAR | VALUE | USERVAR => break,
                b => {
                    bytes.push(b);
                    i += 1;
                }
            }
        }
        (String::from_utf8_lossy(&bytes).to_string(), i)
    }
}

impl TelnetOptionHandler for NewEnvironOption {
    fn option_code(&self) -> TelnetOption {
        TelnetOption::NEW_ENVIRON
    }

    fn handle_subnegotiation(&mut self, data: &[u8]) -> Result<Vec<u8>, OptionError> {
        if data.is_empty() {
            return Err(OptionError::InvalidData(
                "Empty NEW-ENVIRON data".to_string(),
            ));
        }

        match data[0] {
            // SEND (1): host is asking us to provide variables. A non-empty
            // list names specific variables; an empty one means "all of them".
            1 => {
                let requested = Self::parse_send(&data[1..]);
                let wants_devname = requested.is_empty()
                    || requested.iter().any(|n| n.eq_ignore_ascii_case("DEVNAME"));
                let mut response = vec![0u8]; // IS
                if wants_devname {
                    if let Some(name) = &self.requested_device_name {
                        Self::encode_pair(&mut response, "DEVNAME", name);
                    }
                }
                if requested.is_empty() {
                    if let Some(user) = &self.requested_user {
                        response.push(USERVAR);
                        Self::encode_escaped(&mut response, b"USER");
                        response.push(VALUE);
                        Self::encode_escaped(&mut response, user.as_bytes());
                    }
                }
                self.negotiated = true;
                Ok(response)
            }

            // IS (0): host is telling us what it allocated. Only meaningful
            // for TN5250E when the host echoes DEVNAME back.
            0 => {
                let mut i = 1;
                while i < data.len() {
                    if matches!(data[i], VAR | USERVAR) {
                        let (name, next) = Self::read_escaped_token(data, i + 1);
                        if next < data.len() && data[next] == VALUE {
                            let (value, after) = Self::read_escaped_token(data, next + 1);
                            if name.eq_ignore_ascii_case("DEVNAME") {
                                self.allocated_device_name = Some(value);
                            }
                            i = after;
                            continue;
                        }
                        i = next;
                    } else {
                        i += 1;
                    }
                }
                self.negotiated = true;
                Ok(vec![])
            }

            cmd => Err(OptionError::UnsupportedCommand(cmd)),
        }
    }

    fn generate_subnegotiation(
        &self,
        command: SubNegotiationCommand,
    ) -> Result<Vec<u8>, OptionError> {
        match command {
            SubNegotiationCommand::Send => Ok(vec![1]), // SEND, empty variable list
            SubNegotiationCommand::Is => {
                let mut data = vec![0u8];
                if let Some(name) = &self.requested_device_name {
                    Self::encode_pair(&mut data, "DEVNAME", name);
                }
                Ok(data)
            }
        }
    }

    fn is_active(&self) -> bool {
        self.negotiated
    }

    fn reset(&mut self) {
        self.allocated_device_name = None;
        self.negotiated = false;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Default for NewEnvironOption {
    fn default() -> Self {
        Self::new()
    }
}
