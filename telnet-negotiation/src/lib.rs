//! # Telnet Negotiation Library
//!
//! A Rust library for implementing Telnet protocol negotiation as defined in:
//! - RFC 854: Telnet Protocol Specification
//! - RFC 885: Telnet End of Record Option
//! - RFC 1143: The Q Method of Implementing TELNET Option Negotiation
//! - RFC 1091: Telnet Terminal-Type Option
//! - RFC 1571: Telnet Environment Option
//!
//! It implements the client side of the negotiation TN5250E sessions require:
//! BINARY, SUPPRESS-GO-AHEAD, TERMINAL-TYPE, END-OF-RECORD, and NEW-ENVIRON.
//!
//! ## Architecture Overview
//!
//! The library is organized into several modules:
//! - `protocol`: Basic Telnet protocol constants and types (RFC 854)
//! - `negotiation`: Core negotiation logic (RFC 1143 Q-method)
//! - `parser`: Splits a raw telnet byte stream into data and command sequences
//! - `stream`: `TelnetStream` wrapper for transparent, record-oriented integration
//! - `options`: Individual option implementations (Echo, Terminal Type, New Environment)

pub mod negotiation;
pub mod options;
pub mod parser;
pub mod protocol;
pub mod stream;

pub use negotiation::{NegotiationResult, OptionNegotiator, OptionState, Side};
pub use options::{
    EchoOption, EchoState, NewEnvironOption, OptionError, TelnetOptionHandler, TerminalInfo,
    TerminalTypeOption,
};
pub use parser::{ParseResult, TelnetParser};
pub use protocol::{TelnetCommand, TelnetOption, TelnetSequence};
pub use stream::{TelnetStream, TerminalCapabilities};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Telnet RFCs this crate implements
pub const SUPPORTED_RFCS: &[&str] = &[
    "RFC 854 - Telnet Protocol Specification",
    "RFC 885 - Telnet End of Record Option",
    "RFC 1143 - The Q Method of Implementing TELNET Option Negotiation",
    "RFC 1091 - Telnet Terminal-Type Option",
    "RFC 1571 - Telnet Environment Option",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_rfc_list() {
        assert!(!SUPPORTED_RFCS.is_empty());
        assert!(SUPPORTED_RFCS.contains(&"RFC 854 - Telnet Protocol Specification"));
        assert!(SUPPORTED_RFCS.contains(&"RFC 885 - Telnet End of Record Option"));
    }
}
