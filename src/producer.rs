//! Datastream Producer (C3): a background task draining EOR-delimited 5250
//! records off the transport into a bounded queue.

use crate::error::TermError;
use crate::transport::Transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Recommended bound on the number of completed records held between the
/// producer and the virtual terminal before the producer applies
/// backpressure to the socket.
pub const DEFAULT_QUEUE_CAPACITY: usize = 25;

/// One item the producer hands to its consumer.
#[derive(Debug)]
pub enum ProducerEvent {
    Record(Vec<u8>),
    Eof,
    Error(TermError),
}

/// Owns the producer thread and the receiving end of its bounded channel.
pub struct Producer {
    receiver: Receiver<ProducerEvent>,
    writer: Sender<Vec<u8>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Producer {
    /// Spawn the producer thread, taking ownership of `transport`. The
    /// transport's read timeout governs how often the loop wakes up to
    /// check for cancellation and pending outbound writes; a shorter
    /// timeout gives snappier shutdown and replies at the cost of more
    /// idle wakeups.
    pub fn spawn(mut transport: Transport, capacity: usize) -> Self {
        let (tx, rx): (SyncSender<ProducerEvent>, Receiver<ProducerEvent>) =
            sync_channel(capacity.max(1));
        let (write_tx, write_rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();

        let handle = thread::spawn(move || {
            loop {
                if stop_thread.load(Ordering::Relaxed) {
                    break;
                }

                while let Ok(record) = write_rx.try_recv() {
                    if let Err(e) = transport.write_record(&record) {
                        let _ = tx.send(ProducerEvent::Error(e));
                        break;
                    }
                }

                match transport.read_record_raw() {
                    Ok(Some(record)) => {
                        if tx.send(ProducerEvent::Record(record)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(ProducerEvent::Eof);
                        break;
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        // Poll-interval timeout; loop back to the
                        // cancellation check above.
                        continue;
                    }
                    Err(e) => {
                        let _ = tx.send(ProducerEvent::Error(TermError::from(e)));
                        break;
                    }
                }
            }
            eprintln!("[producer] task exiting");
        });

        Self {
            receiver: rx,
            writer: write_tx,
            stop,
            handle: Some(handle),
        }
    }

    /// Block waiting for the next event, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProducerEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Block indefinitely for the next event.
    pub fn recv(&self) -> Option<ProducerEvent> {
        self.receiver.recv().ok()
    }

    /// Queue a record for the producer thread to write out. The write is
    /// picked up the next time the thread's read-timeout poll fires.
    pub fn write_record(&self, record: Vec<u8>) {
        let _ = self.writer.send(record);
    }

    /// Signal the producer thread to stop and drain any remaining queued
    /// events so the thread's final send does not block forever.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        while self.receiver.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};

    fn record_bytes(payload: &[u8]) -> Vec<u8> {
        let mut out = payload.to_vec();
        out.extend_from_slice(&[255, 239]); // IAC EOR
        out
    }

    #[test]
    fn producer_emits_eof_when_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&record_bytes(b"hello")).unwrap();
            // Drop the socket: peer sees EOF.
        });

        let client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let stream = telnet_negotiation::TelnetStream::new(client);
        let transport = crate::transport::Transport::from_negotiated_stream_for_test(stream);

        let producer = Producer::spawn(transport, DEFAULT_QUEUE_CAPACITY);
        let first = producer.recv_timeout(Duration::from_secs(2));
        assert!(matches!(first, Some(ProducerEvent::Record(_))));

        let second = producer.recv_timeout(Duration::from_secs(2));
        assert!(matches!(second, Some(ProducerEvent::Eof)));

        server.join().unwrap();
    }
}
