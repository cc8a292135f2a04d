//! Evidence recorder (C10): an append-only ledger of session activity, plus
//! per-step screen dumps and a JSON summary report, flushed durably at
//! session close.

use crate::field::Field;
use crate::oia::Oia;
use crate::screen::Screen;

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct KeystrokeEntry {
    pub step_id: String,
    pub timestamp: String,
    pub input: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceReport {
    pub session_id: String,
    pub final_oia: Oia,
    pub final_fields: Vec<Field>,
    pub keystrokes: Vec<KeystrokeEntry>,
}

/// Writes the ledger and per-step artifacts for one session. `flush()`
/// (also run on `Drop`) is what makes "durable at session close" (per
/// §4.10) an actual guarantee rather than best-effort.
pub struct EvidenceRecorder {
    session_id: String,
    output_dir: PathBuf,
    ledger: File,
    keystrokes: Vec<KeystrokeEntry>,
    last_oia: Oia,
    last_fields: Vec<Field>,
    flushed: bool,
}

impl EvidenceRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_id: impl Into<String>) -> std::io::Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        let ledger = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_dir.join("ledger.txt"))?;
        Ok(Self {
            session_id: session_id.into(),
            output_dir,
            ledger,
            keystrokes: Vec::new(),
            last_oia: Oia::default(),
            last_fields: Vec::new(),
            flushed: false,
        })
    }

    fn timestamp() -> String {
        jiff::Timestamp::now().to_string()
    }

    fn append_line(&mut self, step_id: &str, message: &str) {
        let line = format!(
            "{} {} {} {}\n",
            Self::timestamp(),
            self.session_id,
            step_id,
            message
        );
        let _ = self.ledger.write_all(line.as_bytes());
    }

    /// Record a `wait_for` boundary (start or end) or any other named step.
    pub fn record_step(&mut self, step_id: &str, message: &str) {
        self.append_line(step_id, message);
    }

    /// Record a keystroke submission for the JSON timeline.
    pub fn record_keystrokes(&mut self, step_id: &str, input: &str) {
        self.append_line(step_id, &format!("send_keys: {input}"));
        self.keystrokes.push(KeystrokeEntry {
            step_id: step_id.to_string(),
            timestamp: Self::timestamp(),
            input: input.to_string(),
        });
    }

    /// Record a failure, with the exact predicate or input that provoked
    /// it, per the "no error hidden from evidence" propagation policy.
    pub fn record_failure(&mut self, step_id: &str, detail: &str) {
        self.append_line(step_id, &format!("FAILURE: {detail}"));
    }

    /// Write a plain-text screen dump for this step: `rows` lines of `cols`
    /// characters, UTF-8.
    pub fn snapshot(&mut self, step_id: &str, screen: &Screen, oia: &Oia, fields: &[Field]) -> std::io::Result<()> {
        let path = self
            .output_dir
            .join(format!("{}_{}.txt", self.session_id, step_id));
        fs::write(path, screen.to_text())?;
        self.last_oia = *oia;
        self.last_fields = fields.to_vec();
        self.append_line(step_id, "snapshot");
        Ok(())
    }

    fn report(&self) -> EvidenceReport {
        EvidenceReport {
            session_id: self.session_id.clone(),
            final_oia: self.last_oia,
            final_fields: self.last_fields.clone(),
            keystrokes: self.keystrokes.clone(),
        }
    }

    /// Write the JSON report and flush the ledger to disk. Idempotent:
    /// calling it more than once (explicitly, then again via `Drop`) only
    /// writes once.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if self.flushed {
            return Ok(());
        }
        let report = self.report();
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(
            self.output_dir.join(format!("{}_report.json", self.session_id)),
            json,
        )?;
        self.ledger.flush()?;
        self.flushed = true;
        Ok(())
    }
}

impl Drop for EvidenceRecorder {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
