//! End-to-end exercises across the public API surface: a scripted sign-on
//! screen driven through `send_keys`/`wait_for`-equivalent building blocks,
//! and a real-socket negotiation failure path.

use std::net::TcpListener;
use std::thread;

use tn5250_engine::config::SessionConfig;
use tn5250_engine::keys::{self, Aid, KeyAction};
use tn5250_engine::vt::VirtualTerminal;
use tn5250_engine::wait::{self, WaitHistory, WaitPredicate};

fn write_to_display(wcc: u8, orders: &[u8]) -> Vec<u8> {
    let mut record = vec![0x01, wcc];
    record.extend_from_slice(orders);
    record
}

/// Builds a two-field sign-on screen (`USER` then `PASS`) the way a real
/// host's first Write to Display would, then drives it through
/// `send_keys`-equivalent parsing exactly as `Session::send_keys` does
/// internally, and checks the assembled AID reply carries both fields.
#[test]
fn sign_on_screen_round_trip_through_vt_keys_and_wait() {
    const SBA: u8 = 0x11;
    const SF: u8 = 0x1D;

    let mut vt = VirtualTerminal::new(SessionConfig::default().screen_size, 37).unwrap();
    let record = write_to_display(
        0,
        &[
            SBA, 0, 0, // buffer address row 0 col 0
            SBA, 0, 5, SF, 0x20, // unprotected field starting at (0,5)
            SBA, 1, 5, SF, 0x20, // second unprotected field at (1,5)
        ],
    );
    vt.apply_record(&record).unwrap();
    assert_eq!(vt.fields().len(), 2);
    assert!(!vt.oia().keyboard_locked);

    let actions = keys::parse_keys("USER01[tab]SECRET[enter]").unwrap();
    keys::validate_single_aid(&actions).unwrap();

    let mut current = 0usize;
    for action in &actions {
        match action {
            KeyAction::Char(c) => {
                let field = vt.fields()[current];
                let mut text = tn5250_engine::field::copy_field_to_string(vt.screen(), &field);
                text.push(*c);
                tn5250_engine::field::set_field(vt.screen_mut(), &field, &text).unwrap();
                vt.mark_modified(field.attr_pos);
            }
            KeyAction::Tab => current = (current + 1) % vt.fields().len(),
            KeyAction::Aid(_) => {}
            _ => {}
        }
    }

    let trailing = keys::trailing_aid(&actions).unwrap();
    assert_eq!(trailing, Aid::ENTER);
    let reply = vt.assemble_reply(trailing).unwrap();
    assert_eq!(reply[0], Aid::ENTER.0);

    let history = WaitHistory::default();
    let predicate = WaitPredicate::KeyboardUnlock;
    assert!(wait::evaluate(&predicate, vt.screen(), &vt.oia(), vt.fields(), &history));
}

/// A host that accepts the TCP connection but never answers telnet
/// negotiation leaves `Transport::connect` to fail cleanly rather than hang
/// indefinitely.
#[test]
fn connect_against_silent_host_fails_negotiation_cleanly() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        // Hold the connection open without responding to any negotiation;
        // this blocking read returns once the client gives up and closes.
        let mut buf = [0u8; 256];
        loop {
            match std::io::Read::read(&mut socket, &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    });

    let mut config = SessionConfig::default();
    config.host = addr.ip().to_string();
    config.port = addr.port();
    config.connect_timeout_ms = 2_000;

    let result = tn5250_engine::transport::Transport::connect(&config);
    assert!(result.is_err());

    server.join().unwrap();
}
