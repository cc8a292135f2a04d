//! # TelnetStream - Transparent Telnet Protocol Wrapper
//!
//! This module provides `TelnetStream`, a transparent wrapper around `TcpStream`
//! that automatically handles Telnet protocol negotiation and command processing
//! for the TN5250E client role.
//!
//! ## Key Features:
//!
//! ### Transparent Operation
//! `TelnetStream` implements `Read` and `Write` traits, allowing it to be used as
//! a drop-in replacement for `TcpStream` in existing applications.
//!
//! ### Automatic Negotiation
//! All RFC 1143 compliant option negotiation happens automatically in the background.
//! Applications receive only clean data without telnet command sequences.
//!
//! ### Record-Oriented Reads
//! TN5250E delimits logical screen-update records with `IAC EOR` rather than
//! relying on TCP segment boundaries. [`TelnetStream::read_record`] accumulates
//! bytes until an End-of-Record marker is seen and returns exactly one record.
//!
//! ## Internal Architecture
//!
//! `TelnetStream` maintains:
//! - `TelnetParser`: Separates telnet commands from data
//! - `OptionNegotiator`: Handles RFC 1143 option negotiation
//! - Internal buffers for clean data separation
//! - Automatic response generation and transmission

use crate::negotiation::{OptionNegotiator, Side};
use crate::options::{EchoOption, NewEnvironOption, TelnetOptionHandler, TerminalTypeOption};
use crate::parser::TelnetParser;
use crate::protocol::{TelnetCommand, TelnetOption, TelnetSequence};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Device capabilities negotiated with the host, derived from the accepted
/// terminal type and NEW-ENVIRON exchange.
#[derive(Debug, Clone, Default)]
pub struct TerminalCapabilities {
    /// Screen rows, once a device type has been offered
    pub rows: Option<u16>,
    /// Screen columns, once a device type has been offered
    pub cols: Option<u16>,
    /// Device type string offered to the host (e.g. "IBM-3179-2")
    pub device_type: Option<String>,
    /// Whether the offered device type is a double-byte (DBCS) device
    pub dbcs: bool,
    /// Device name allocated by the host, if learned via NEW-ENVIRON
    pub device_name: Option<String>,
}

/// A transparent wrapper around TcpStream that drives TN5250E telnet
/// negotiation automatically from the client side.
///
/// `TelnetStream` provides the same interface as `TcpStream` while
/// transparently handling option negotiation and command processing in the
/// background, plus a record-oriented read for EOR-delimited 5250 data
/// streams.
pub struct TelnetStream {
    /// Underlying TCP stream
    inner: TcpStream,

    /// Telnet command parser for incoming data
    parser: TelnetParser,

    /// RFC 1143 option negotiation state machine
    negotiator: OptionNegotiator,

    /// Option handlers for sub-negotiation processing
    option_handlers: HashMap<TelnetOption, Box<dyn TelnetOptionHandler>>,

    /// Buffer for clean application data (telnet commands filtered out)
    data_buffer: VecDeque<u8>,

    /// Buffer for incomplete reads from the underlying stream
    read_buffer: Vec<u8>,

    /// Whether to log telnet activity for debugging
    debug_logging: bool,
}

impl TelnetStream {
    /// Create a new TelnetStream wrapping the provided TcpStream
    pub fn new(stream: TcpStream) -> Self {
        Self::build(stream, false)
    }

    /// Create a new TelnetStream with debug logging enabled
    pub fn with_debug(stream: TcpStream) -> Self {
        Self::build(stream, true)
    }

    fn build(stream: TcpStream, debug_logging: bool) -> Self {
        let mut telnet_stream = Self {
            inner: stream,
            parser: TelnetParser::new(),
            negotiator: OptionNegotiator::new(),
            option_handlers: HashMap::new(),
            data_buffer: VecDeque::new(),
            read_buffer: Vec::new(),
            debug_logging,
        };

        telnet_stream.register_core_options();
        telnet_stream
    }

    /// Enable or disable RFC 1143 queue system
    pub fn set_queue_enabled(&mut self, enabled: bool) {
        self.negotiator.set_queue_enabled(enabled);
    }

    /// Check if a telnet option is currently enabled on the specified side
    pub fn is_option_enabled(&self, side: Side, option: crate::TelnetOption) -> bool {
        self.negotiator.is_enabled(side, option)
    }

    /// Register the option handlers a TN5250E client needs: ECHO, TERMINAL
    /// TYPE, and NEW-ENVIRON. Binary mode and suppress-go-ahead carry no
    /// sub-negotiation payload and need no handler.
    fn register_core_options(&mut self) {
        self.option_handlers
            .insert(TelnetOption::ECHO, Box::new(EchoOption::new(false)));

        self.option_handlers.insert(
            TelnetOption::TERMINAL_TYPE,
            Box::new(TerminalTypeOption::with_default_candidates()),
        );

        self.option_handlers.insert(
            TelnetOption::NEW_ENVIRON,
            Box::new(NewEnvironOption::new()),
        );
    }

    /// Configure the device name (and optional user) offered during
    /// NEW-ENVIRON negotiation. Must be called before [`Self::negotiate`].
    pub fn set_device_name(&mut self, device_name: Option<String>, user: Option<String>) {
        if let Some(handler) = self.option_handlers.get_mut(&TelnetOption::NEW_ENVIRON) {
            if let Some(new_environ) = handler.as_any_mut().downcast_mut::<NewEnvironOption>() {
                new_environ.set_requested(device_name, user);
            }
        }
    }

    /// Configure the candidate device types offered during terminal type
    /// negotiation, in preference order. Must be called before
    /// [`Self::negotiate`].
    pub fn set_device_type_candidates(&mut self, candidates: Vec<String>) {
        self.option_handlers.insert(
            TelnetOption::TERMINAL_TYPE,
            Box::new(TerminalTypeOption::new(candidates)),
        );
    }

    /// Register a custom option handler
    pub fn register_option_handler(&mut self, handler: Box<dyn TelnetOptionHandler>) {
        let option = handler.option_code();
        self.option_handlers.insert(option, handler);

        if self.debug_logging {
            eprintln!("[TelnetStream] Registered handler for option {:?}", option);
        }
    }

    fn get_option_handler(&self, option: TelnetOption) -> Option<&dyn TelnetOptionHandler> {
        self.option_handlers.get(&option).map(|h| h.as_ref())
    }

    /// Drive the client side of TN5250E session establishment: request
    /// BINARY transmission in both directions, SUPPRESS-GO-AHEAD, TERMINAL
    /// TYPE, END-OF-RECORD and NEW-ENVIRON, then pump incoming negotiation
    /// traffic until the host has answered all of them or `deadline`
    /// elapses.
    pub fn negotiate(&mut self, deadline: Duration) -> io::Result<()> {
        for option in [
            TelnetOption::BINARY,
            TelnetOption::SUPPRESS_GO_AHEAD,
            TelnetOption::TERMINAL_TYPE,
            TelnetOption::END_OF_RECORD,
            TelnetOption::NEW_ENVIRON,
        ] {
            self.send_negotiation(TelnetCommand::DO, option)?;
            self.send_negotiation(TelnetCommand::WILL, option)?;
        }

        let started = std::time::Instant::now();
        let previous_timeout = self.inner.read_timeout()?;
        self.inner.set_read_timeout(Some(Duration::from_millis(100)))?;

        while started.elapsed() < deadline {
            match self.process_incoming_data() {
                Ok(_) => {}
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => {
                    self.inner.set_read_timeout(previous_timeout)?;
                    return Err(e);
                }
            }

            if self.is_option_enabled(Side::Remote, TelnetOption::TERMINAL_TYPE)
                && self.is_option_enabled(Side::Local, TelnetOption::END_OF_RECORD)
            {
                break;
            }
        }

        self.inner.set_read_timeout(previous_timeout)?;
        Ok(())
    }

    fn send_negotiation(&mut self, command: TelnetCommand, option: TelnetOption) -> io::Result<()> {
        let sequence = TelnetSequence::Negotiation { command, option };
        self.inner.write_all(&sequence.to_bytes())?;
        self.inner.flush()
    }

    /// Process sub-negotiation for a specific option
    fn process_option_subnegotiation(
        &mut self,
        option: TelnetOption,
        data: &[u8],
    ) -> io::Result<()> {
        if let Some(handler) = self.option_handlers.get_mut(&option) {
            match handler.handle_subnegotiation(data) {
                Ok(response_data) => {
                    if !response_data.is_empty() {
                        let mut response = Vec::new();
                        response.extend_from_slice(&[255, 250]); // IAC SB
                        response.push(option as u8);
                        response.extend_from_slice(&response_data);
                        response.extend_from_slice(&[255, 240]); // IAC SE

                        self.inner.write_all(&response)?;

                        if self.debug_logging {
                            eprintln!(
                                "[TelnetStream] Sent sub-negotiation response for {:?}: {} bytes",
                                option,
                                response_data.len()
                            );
                        }
                    }
                    Ok(())
                }
                Err(e) => {
                    if self.debug_logging {
                        eprintln!(
                            "[TelnetStream] Sub-negotiation error for {:?}: {}",
                            option, e
                        );
                    }
                    Ok(())
                }
            }
        } else {
            if self.debug_logging {
                eprintln!(
                    "[TelnetStream] No handler registered for option {:?}",
                    option
                );
            }
            Ok(())
        }
    }

    /// Get the peer address of the underlying TcpStream
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    /// Get the local address of the underlying TcpStream
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Set the read timeout for the underlying TcpStream
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(dur)
    }

    /// Set the write timeout for the underlying TcpStream
    pub fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        self.inner.set_write_timeout(dur)
    }

    /// Get the read timeout of the underlying TcpStream
    pub fn read_timeout(&self) -> io::Result<Option<Duration>> {
        self.inner.read_timeout()
    }

    /// Get the write timeout of the underlying TcpStream
    pub fn write_timeout(&self) -> io::Result<Option<Duration>> {
        self.inner.write_timeout()
    }

    /// Set the TTL for the underlying TcpStream
    pub fn set_ttl(&self, ttl: u32) -> io::Result<()> {
        self.inner.set_ttl(ttl)
    }

    /// Get the TTL of the underlying TcpStream
    pub fn ttl(&self) -> io::Result<u32> {
        self.inner.ttl()
    }

    /// Enable or disable Nagle's algorithm for the underlying TcpStream
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.inner.set_nodelay(nodelay)
    }

    /// Check if Nagle's algorithm is disabled for the underlying TcpStream
    pub fn nodelay(&self) -> io::Result<bool> {
        self.inner.nodelay()
    }

    /// Shutdown the underlying TcpStream
    pub fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()> {
        self.inner.shutdown(how)
    }

    /// Try to clone the underlying TcpStream
    pub fn try_clone(&self) -> io::Result<TcpStream> {
        self.inner.try_clone()
    }

    /// Process incoming data and handle telnet commands automatically.
    ///
    /// Returns the number of clean data bytes available for application use.
    fn process_incoming_data(&mut self) -> io::Result<usize> {
        let mut temp_buffer = [0; 4096];
        let bytes_read = match self.inner.read(&mut temp_buffer) {
            Ok(0) => return Ok(0), // EOF
            Ok(n) => n,
            Err(e) => return Err(e),
        };

        self.read_buffer
            .extend_from_slice(&temp_buffer[..bytes_read]);

        let parse_result = self.parser.parse(&self.read_buffer);

        if parse_result.bytes_consumed > 0 {
            self.read_buffer.drain(0..parse_result.bytes_consumed);
        }

        let data_bytes_added = parse_result.data.len();
        for byte in parse_result.data {
            self.data_buffer.push_back(byte);
        }

        for sequence in parse_result.sequences {
            if let Err(e) = self.handle_telnet_sequence(&sequence) {
                if self.debug_logging {
                    eprintln!(
                        "[TelnetStream] Error handling sequence {:?}: {}",
                        sequence, e
                    );
                }
            }
        }

        Ok(data_bytes_added)
    }

    /// Handle a single telnet sequence and send appropriate responses.
    /// Returns `true` if the sequence was an `IAC EOR`, marking the end of a
    /// logical 5250 data record.
    fn handle_telnet_sequence(&mut self, sequence: &TelnetSequence) -> io::Result<bool> {
        match sequence {
            TelnetSequence::Negotiation { command, option } => {
                if self.debug_logging {
                    eprintln!("[TelnetStream] Processing: {:?} {:?}", command, option);
                }

                let result = match command {
                    TelnetCommand::WILL => self.negotiator.handle_will(*option),
                    TelnetCommand::WONT => self.negotiator.handle_wont(*option),
                    TelnetCommand::DO => self.negotiator.handle_do(*option),
                    TelnetCommand::DONT => self.negotiator.handle_dont(*option),
                    _ => {
                        if self.debug_logging {
                            eprintln!(
                                "[TelnetStream] Non-negotiation command in negotiation sequence: {:?}",
                                command
                            );
                        }
                        return Ok(false);
                    }
                };

                if let Some(response) = result.response {
                    let response_bytes = response.to_bytes();
                    self.inner.write_all(&response_bytes)?;
                    self.inner.flush()?;

                    if self.debug_logging {
                        if let TelnetSequence::Negotiation { command, option } = response {
                            eprintln!("[TelnetStream] Sent response: {:?} {:?}", command, option);
                        }
                    }
                }

                if let Some(error) = result.error {
                    if self.debug_logging {
                        eprintln!(
                            "[TelnetStream] Negotiation error for {:?}: {}",
                            option, error
                        );
                    }
                }

                // A WILL TERMINAL_TYPE / WILL NEW_ENVIRON from the host is
                // not how TN5250E asks for these; the host asks via a SEND
                // sub-negotiation once we've agreed to send (WILL on our
                // side). Nothing further to do here.
                Ok(false)
            }

            TelnetSequence::SubNegotiation { option, data } => {
                if self.debug_logging {
                    eprintln!(
                        "[TelnetStream] Sub-negotiation for {:?}: {} bytes",
                        option,
                        data.len()
                    );
                }

                self.process_option_subnegotiation(*option, data)?;
                Ok(false)
            }

            TelnetSequence::Command(cmd) => {
                if self.debug_logging {
                    eprintln!("[TelnetStream] Simple command: {:?}", cmd);
                }
                Ok(*cmd == TelnetCommand::EOR)
            }

            TelnetSequence::EscapedData(byte) => {
                if self.debug_logging {
                    eprintln!("[TelnetStream] Escaped data byte: {}", byte);
                }
                Ok(false)
            }
        }
    }

    /// Get access to the underlying TcpStream for advanced operations
    pub fn get_ref(&self) -> &TcpStream {
        &self.inner
    }

    /// Get mutable access to the underlying TcpStream
    pub fn get_mut(&mut self) -> &mut TcpStream {
        &mut self.inner
    }

    /// Extract the underlying TcpStream, consuming the TelnetStream
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }

    /// Block until one complete EOR-delimited 5250 data record has been
    /// received, returning its bytes with telnet command sequences
    /// stripped out. Returns `Ok(None)` on clean EOF with no partial data
    /// pending.
    pub fn read_record(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            let mut temp_buffer = [0; 4096];
            let bytes_read = self.inner.read(&mut temp_buffer)?;
            if bytes_read == 0 {
                if self.data_buffer.is_empty() {
                    return Ok(None);
                }
                let record: Vec<u8> = self.data_buffer.drain(..).collect();
                return Ok(Some(record));
            }

            self.read_buffer
                .extend_from_slice(&temp_buffer[..bytes_read]);

            let parse_result = self.parser.parse(&self.read_buffer);
            if parse_result.bytes_consumed > 0 {
                self.read_buffer.drain(0..parse_result.bytes_consumed);
            }

            for byte in parse_result.data {
                self.data_buffer.push_back(byte);
            }

            let mut saw_eor = false;
            for sequence in &parse_result.sequences {
                if self.handle_telnet_sequence(sequence)? {
                    saw_eor = true;
                }
            }

            if saw_eor {
                let record: Vec<u8> = self.data_buffer.drain(..).collect();
                return Ok(Some(record));
            }
        }
    }

    /// Write a complete 5250 data record, escaping embedded IAC bytes and
    /// terminating it with `IAC EOR`.
    pub fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.write_all(record)?;
        self.inner.write_all(&[255, TelnetCommand::EOR as u8])?;
        self.inner.flush()
    }

    /// Get current terminal/device capabilities negotiated with the host
    pub fn get_terminal_capabilities(&self) -> TerminalCapabilities {
        let mut caps = TerminalCapabilities::default();

        if let Some(handler) = self.get_option_handler(TelnetOption::TERMINAL_TYPE) {
            if let Some(term_handler) = handler.as_any().downcast_ref::<TerminalTypeOption>() {
                if let Some(device_caps) = term_handler.offered_capabilities() {
                    caps.rows = Some(device_caps.rows);
                    caps.cols = Some(device_caps.cols);
                    caps.dbcs = device_caps.dbcs;
                }
                caps.device_type = term_handler.offered_type().map(|s| s.to_string());
            }
        }

        if let Some(handler) = self.get_option_handler(TelnetOption::NEW_ENVIRON) {
            if let Some(new_environ) = handler.as_any().downcast_ref::<NewEnvironOption>() {
                caps.device_name = new_environ
                    .allocated_device_name()
                    .map(|s| s.to_string())
                    .or_else(|| new_environ.requested_device_name().map(|s| s.to_string()));
            }
        }

        caps
    }

    /// Get the current echo state. Returns true if remote echo is active
    /// (host handles echoing), false if local echo is active.
    pub fn is_echo_remote(&self) -> bool {
        if let Some(handler) = self.get_option_handler(TelnetOption::ECHO) {
            if let Some(echo_handler) = handler.as_any().downcast_ref::<EchoOption>() {
                return echo_handler.is_remote_echo();
            }
        }
        false
    }
}

/// Implement Read trait for transparent telnet operation
impl Read for TelnetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.data_buffer.is_empty() {
            let bytes_to_copy = std::cmp::min(buf.len(), self.data_buffer.len());
            for slot in buf.iter_mut().take(bytes_to_copy) {
                *slot = self.data_buffer.pop_front().unwrap();
            }
            return Ok(bytes_to_copy);
        }

        loop {
            let data_added = self.process_incoming_data()?;

            if data_added == 0 {
                if self.data_buffer.is_empty() {
                    let mut temp = [0; 1];
                    match self.inner.read(&mut temp) {
                        Ok(0) => return Ok(0),
                        Ok(n) => {
                            self.read_buffer.extend_from_slice(&temp[..n]);
                            continue;
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                            return Err(io::Error::new(io::ErrorKind::WouldBlock, "Would block"));
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    let bytes_to_copy = std::cmp::min(buf.len(), self.data_buffer.len());
                    for slot in buf.iter_mut().take(bytes_to_copy) {
                        *slot = self.data_buffer.pop_front().unwrap();
                    }
                    return Ok(bytes_to_copy);
                }
            } else {
                let bytes_to_copy = std::cmp::min(buf.len(), self.data_buffer.len());
                for slot in buf.iter_mut().take(bytes_to_copy) {
                    *slot = self.data_buffer.pop_front().unwrap();
                }
                return Ok(bytes_to_copy);
            }
        }
    }
}

/// Implement Write trait for transparent telnet operation.
///
/// Escapes IAC bytes per RFC 854 but does not append EOR; use
/// [`TelnetStream::write_record`] for record-terminated writes.
impl Write for TelnetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut escaped_data = Vec::new();
        let mut needs_escaping = false;

        for &byte in buf {
            if byte == 255 {
                escaped_data.push(255);
                escaped_data.push(255);
                needs_escaping = true;
            } else {
                escaped_data.push(byte);
            }
        }

        if needs_escaping {
            self.inner.write_all(&escaped_data)?;
            Ok(buf.len())
        } else {
            self.inner.write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
