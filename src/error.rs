use std::fmt;

/// Custom configuration errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String, String),
    UnknownKey(String),
    UnknownSection(String),
    OutOfRange(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value '{}' for key '{}'", value, key)
            }
            ConfigError::UnknownKey(key) => write!(f, "Unknown configuration key: '{}'", key),
            ConfigError::UnknownSection(section) => write!(f, "Unknown section: '{}'", section),
            ConfigError::OutOfRange(key, reason) => {
                write!(f, "Value for '{}' out of range: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by the engine, named per the stable error list the
/// external interfaces document promises callers.
#[derive(Debug)]
pub enum TermError {
    /// Configuration could not be loaded or validated
    InvalidConfig(String),

    /// Connecting to the host did not complete within the configured timeout
    ConnectTimeout,

    /// The host closed or reset the connection
    ConnectionReset,

    /// TLS handshake did not complete
    TlsHandshakeFailed(String),

    /// Telnet/TN5250E option negotiation did not reach the required state
    TelnetNegotiationFailed(String),

    /// The host rejected the requested device name and no alternative was configured
    DeviceNameRejected(String),

    /// No codec is registered for the requested CCSID
    UnknownCcsid(u16),

    /// A character could not be converted to or from EBCDIC for a CCSID
    ConversionError { ccsid: u16, scalar: u32 },

    /// Input was refused because the keyboard is locked or input is inhibited
    InputInhibited,

    /// More than one AID-producing mnemonic was present in one `send_keys` call
    MultipleAid,

    /// A write targeted a protected field
    ProtectedField,

    /// A write to a numeric-only field contained a non-digit character
    NumericFieldViolation,

    /// A `wait_for` predicate did not become true before its timeout
    WaitTimeout { predicate: String, elapsed_ms: u64 },

    /// A suspending operation was cancelled before completion
    Cancelled,

    /// `Pool::acquire` did not obtain a session before its timeout
    PoolAcquireTimeout,

    /// The pool has been shut down and rejects further acquisition
    PoolClosed,

    /// Catch-all session-level error not covered by a more specific variant
    SessionError(String),

    /// Protocol errors that are logged and dropped rather than surfaced
    /// as fatal (unknown opcode, malformed order, SBA out of bounds)
    Protocol(String),

    /// Underlying I/O failure
    Io(std::io::Error),
}

impl fmt::Display for TermError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            TermError::ConnectTimeout => write!(f, "connection timed out"),
            TermError::ConnectionReset => write!(f, "connection reset by host"),
            TermError::TlsHandshakeFailed(msg) => write!(f, "TLS handshake failed: {}", msg),
            TermError::TelnetNegotiationFailed(msg) => {
                write!(f, "telnet negotiation failed: {}", msg)
            }
            TermError::DeviceNameRejected(name) => {
                write!(f, "host rejected device name '{}'", name)
            }
            TermError::UnknownCcsid(ccsid) => write!(f, "unknown CCSID: {}", ccsid),
            TermError::ConversionError { ccsid, scalar } => write!(
                f,
                "no conversion for U+{:04X} in CCSID {}",
                scalar, ccsid
            ),
            TermError::InputInhibited => write!(f, "input inhibited: keyboard locked"),
            TermError::MultipleAid => write!(f, "more than one AID mnemonic in input"),
            TermError::ProtectedField => write!(f, "cannot write to a protected field"),
            TermError::NumericFieldViolation => {
                write!(f, "non-digit character written to a numeric-only field")
            }
            TermError::WaitTimeout {
                predicate,
                elapsed_ms,
            } => write!(
                f,
                "wait_for({}) timed out after {}ms",
                predicate, elapsed_ms
            ),
            TermError::Cancelled => write!(f, "operation cancelled"),
            TermError::PoolAcquireTimeout => write!(f, "pool acquire timed out"),
            TermError::PoolClosed => write!(f, "session pool is shut down"),
            TermError::SessionError(msg) => write!(f, "session error: {}", msg),
            TermError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            TermError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for TermError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TermError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TermError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                TermError::ConnectionReset
            }
            ErrorKind::TimedOut => TermError::ConnectTimeout,
            _ => TermError::Io(err),
        }
    }
}

impl From<ConfigError> for TermError {
    fn from(err: ConfigError) -> Self {
        TermError::InvalidConfig(err.to_string())
    }
}

/// Result type alias used throughout the engine
pub type TermResult<T> = Result<T, TermError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_eof_maps_to_connection_reset() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let term_err: TermError = io_err.into();
        assert!(matches!(term_err, TermError::ConnectionReset));
    }

    #[test]
    fn config_error_converts_with_message() {
        let cfg_err = ConfigError::UnknownKey("bogus".to_string());
        let term_err: TermError = cfg_err.into();
        match term_err {
            TermError::InvalidConfig(msg) => assert!(msg.contains("bogus")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn conversion_error_display_includes_ccsid_and_scalar() {
        let err = TermError::ConversionError {
            ccsid: 37,
            scalar: 0xFFFF,
        };
        let text = err.to_string();
        assert!(text.contains("37"));
        assert!(text.contains("FFFF"));
    }
}
