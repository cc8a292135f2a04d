//! Transport (C2): opens the byte stream to the host and drives telnet/
//! TN5250E negotiation over it via the `telnet-negotiation` crate.

use crate::config::{ScreenSize, SessionConfig, SslType};
use crate::error::{TermError, TermResult};

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use telnet_negotiation::{Side, TelnetOption, TelnetStream};

fn device_type_candidates(screen_size: ScreenSize, dbcs: bool) -> Vec<String> {
    match (screen_size, dbcs) {
        (ScreenSize::Size27x132, true) => vec!["IBM-5555-C01".to_string()],
        (ScreenSize::Size27x132, false) => {
            vec!["IBM-3477-FC".to_string(), "IBM-3180-2".to_string()]
        }
        (ScreenSize::Size24x80, true) => vec!["IBM-5555-B01".to_string()],
        (ScreenSize::Size24x80, false) => vec![
            "IBM-3179-2".to_string(),
            "IBM-5292-2".to_string(),
            "IBM-3196-A1".to_string(),
            "IBM-5291-1".to_string(),
            "IBM-5251-11".to_string(),
        ],
    }
}

/// Opens and negotiates the connection to a 5250 host. Holds the negotiated
/// `TelnetStream` and the device identity the host allocated.
pub struct Transport {
    stream: TelnetStream,
    allocated_device_name: Option<String>,
    negotiated_device_type: Option<String>,
    encrypted: bool,
}

impl Transport {
    /// Resolve `host:port`, connect with `connect_timeout_ms`, and drive
    /// TN5250E negotiation to completion (or timeout).
    pub fn connect(config: &SessionConfig) -> TermResult<Self> {
        if config.ssl_type != SslType::None {
            return Err(TermError::TlsHandshakeFailed(
                "encrypted transport is not wired into this build".to_string(),
            ));
        }

        let addr = resolve_one(&config.host, config.port)?;
        let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                TermError::ConnectTimeout
            } else {
                TermError::from(e)
            }
        })?;
        tcp.set_read_timeout(Some(config.read_timeout()))?;

        eprintln!(
            "[transport] connected to {}:{}",
            config.host, config.port
        );

        let mut stream = TelnetStream::new(tcp);
        let dbcs = crate::codec::is_dbcs(config.ccsid);
        stream.set_device_type_candidates(device_type_candidates(config.screen_size, dbcs));

        let device_name = if config.device_name.is_empty() {
            None
        } else {
            Some(config.device_name.clone())
        };
        stream.set_device_name(device_name, None);

        stream
            .negotiate(Duration::from_millis(5_000))
            .map_err(TermError::from)?;

        if !(stream.is_option_enabled(Side::Remote, TelnetOption::TERMINAL_TYPE)
            && stream.is_option_enabled(Side::Local, TelnetOption::END_OF_RECORD))
        {
            return Err(TermError::TelnetNegotiationFailed(
                "host did not complete terminal-type/end-of-record negotiation".to_string(),
            ));
        }

        let caps = stream.get_terminal_capabilities();
        if let Some(allocated) = &caps.device_name {
            if !config.device_name.is_empty() && allocated != &config.device_name {
                eprintln!(
                    "[negotiation] host allocated device name '{}' for requested '{}'",
                    allocated, config.device_name
                );
            }
        }
        eprintln!(
            "[negotiation] complete: device_type={:?} device_name={:?}",
            caps.device_type, caps.device_name
        );

        Ok(Self {
            stream,
            allocated_device_name: caps.device_name,
            negotiated_device_type: caps.device_type,
            encrypted: false,
        })
    }

    pub fn allocated_device_name(&self) -> Option<&str> {
        self.allocated_device_name.as_deref()
    }

    pub fn negotiated_device_type(&self) -> Option<&str> {
        self.negotiated_device_type.as_deref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Block until one complete EOR-delimited 5250 record arrives, or
    /// `Ok(None)` on clean EOF.
    pub fn read_record(&mut self) -> TermResult<Option<Vec<u8>>> {
        self.stream.read_record().map_err(TermError::from)
    }

    /// As [`Self::read_record`], but preserves the raw `io::Error` so a
    /// caller can distinguish a read-timeout poll (`WouldBlock`/`TimedOut`,
    /// used to give a cancellable loop a chance to check its stop signal)
    /// from a genuine transport failure.
    pub fn read_record_raw(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        self.stream.read_record()
    }

    pub fn write_record(&mut self, record: &[u8]) -> TermResult<()> {
        self.stream.write_record(record).map_err(TermError::from)
    }

    pub fn close(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        eprintln!("[transport] connection closed");
    }

    /// Wrap an already-built `TelnetStream` directly, skipping negotiation.
    /// Used by tests in this crate that exercise record framing without a
    /// real TN5250E host on the other end.
    #[cfg(test)]
    pub(crate) fn from_negotiated_stream_for_test(stream: TelnetStream) -> Self {
        Self {
            stream,
            allocated_device_name: None,
            negotiated_device_type: None,
            encrypted: false,
        }
    }
}

fn resolve_one(host: &str, port: u16) -> TermResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(TermError::from)?
        .next()
        .ok_or_else(|| TermError::SessionError(format!("could not resolve host '{host}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_candidates_pick_dbcs_variant() {
        let candidates = device_type_candidates(ScreenSize::Size24x80, true);
        assert_eq!(candidates, vec!["IBM-5555-B01".to_string()]);
    }

    #[test]
    fn device_type_candidates_pick_27x132_sbcs() {
        let candidates = device_type_candidates(ScreenSize::Size27x132, false);
        assert!(candidates.contains(&"IBM-3180-2".to_string()));
    }

    #[test]
    fn ssl_configuration_is_rejected_until_wired_in() {
        let mut config = SessionConfig::default();
        config.ssl_type = SslType::Tls;
        let result = Transport::connect(&config);
        assert!(matches!(result, Err(TermError::TlsHandshakeFailed(_))));
    }

    #[test]
    fn connect_to_closed_port_times_out_or_resets() {
        let mut config = SessionConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 1; // reserved, nothing listens
        config.connect_timeout_ms = 200;
        let result = Transport::connect(&config);
        assert!(result.is_err());
    }
}
