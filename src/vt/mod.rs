//! Virtual Terminal (C8): interprets 5250 opcodes and orders against the
//! screen planes, field table, and OIA, and assembles outbound AID replies.

pub mod opcodes;

use crate::codec::{self, SbcsCodec};
use crate::config::ScreenSize;
use crate::error::TermError;
use crate::field::{self, Field};
use crate::keys::Aid;
use crate::oia::{Oia, OiaTracker};
use crate::screen::{Screen, ATTR_FIELD_START};
use opcodes::{Opcode, Order, Wcc};

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VtState {
    Idle,
    Receiving,
    Applying,
    Replying,
    Error,
}

/// Which fields go into the next AID reply: all of them (`Read Input
/// Fields`) or only those with their modified-data-tag set (`Read MDT
/// Fields`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    AllFields,
    MdtFieldsOnly,
}

pub struct VirtualTerminal {
    screen: Screen,
    saved_screen: Option<Screen>,
    fields: Vec<Field>,
    oia: OiaTracker,
    codec: SbcsCodec,
    mdt: HashSet<usize>,
    read_mode: ReadMode,
    state: VtState,
}

impl VirtualTerminal {
    pub fn new(screen_size: ScreenSize, ccsid: u16) -> Result<Self, TermError> {
        let codec = codec::lookup(ccsid)?;
        Ok(Self {
            screen: Screen::new(screen_size),
            saved_screen: None,
            fields: Vec::new(),
            oia: OiaTracker::new(),
            codec,
            mdt: HashSet::new(),
            read_mode: ReadMode::AllFields,
            state: VtState::Idle,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn oia(&self) -> Oia {
        self.oia.state()
    }

    pub fn oia_tracker_mut(&mut self) -> &mut OiaTracker {
        &mut self.oia
    }

    pub fn state(&self) -> VtState {
        self.state
    }

    fn rescan_fields(&mut self) {
        self.fields = field::discover_fields(&self.screen);
    }

    /// Record that a field's contents changed locally (via `send_keys`),
    /// so the next AID reply includes it under `Read MDT Fields`.
    pub fn mark_modified(&mut self, attr_pos: usize) {
        self.mdt.insert(attr_pos);
    }

    /// Apply one EOR-delimited record (opcode byte + payload) to the
    /// terminal state. Protocol errors are logged and the frame dropped
    /// without closing the session per the component's failure semantics.
    pub fn apply_record(&mut self, record: &[u8]) -> Result<(), TermError> {
        self.state = VtState::Applying;
        let result = self.apply_record_inner(record);
        match &result {
            Ok(()) => self.state = VtState::Idle,
            Err(TermError::Protocol(msg)) => {
                eprintln!("[vt] dropping malformed frame: {msg}");
                self.state = VtState::Idle;
                return Ok(());
            }
            Err(_) => self.state = VtState::Error,
        }
        result
    }

    fn apply_record_inner(&mut self, record: &[u8]) -> Result<(), TermError> {
        let &opcode_byte = record
            .first()
            .ok_or_else(|| TermError::Protocol("empty record".to_string()))?;
        let opcode = Opcode::from_byte(opcode_byte)?;
        let payload = &record[1..];

        match opcode {
            Opcode::WriteToDisplay => self.apply_write_to_display(payload)?,
            Opcode::ClearUnit => self.clear_unit(),
            Opcode::ClearFormatTable => self.clear_format_table(),
            Opcode::ReadInputFields => self.read_mode = ReadMode::AllFields,
            Opcode::ReadMdtFields => self.read_mode = ReadMode::MdtFieldsOnly,
            Opcode::SaveScreen => self.saved_screen = Some(self.screen.clone()),
            Opcode::RestoreScreen => {
                if let Some(saved) = self.saved_screen.clone() {
                    self.screen = saved;
                    self.rescan_fields();
                }
            }
            Opcode::WriteErrorCode => self.write_error_code(payload),
            Opcode::Roll => self.roll(payload),
        }
        Ok(())
    }

    fn apply_write_to_display(&mut self, payload: &[u8]) -> Result<(), TermError> {
        let &wcc_byte = payload
            .first()
            .ok_or_else(|| TermError::Protocol("write to display missing WCC".to_string()))?;
        let wcc = Wcc::from_byte(wcc_byte);
        let orders = opcodes::parse_orders(&payload[1..])?;

        let mut attrs_changed = false;
        for order in orders {
            match order {
                Order::SetBufferAddress { row, col } => {
                    if let Some(pos) = self.screen.try_pos(row, col) {
                        self.screen.move_cursor(pos as u32);
                    } else {
                        return Err(TermError::Protocol(format!(
                            "SBA out of bounds: ({row}, {col})"
                        )));
                    }
                }
                Order::StartField { attr } => {
                    let pos = self.screen.cursor() as usize;
                    self.screen.write_attr(pos, attr | ATTR_FIELD_START);
                    self.screen.move_cursor(self.screen.cursor() + 1);
                    attrs_changed = true;
                }
                Order::SetAttribute { attr } => {
                    let pos = self.screen.cursor() as usize;
                    self.screen.write_attr(pos, attr);
                    self.screen.move_cursor(self.screen.cursor() + 1);
                    attrs_changed = true;
                }
                Order::InsertCursor => {
                    // Cursor is already at the intended position; nothing
                    // further to apply beyond noting the request.
                }
                Order::RepeatToAddress { row, col, ebcdic_byte } => {
                    let target = self
                        .screen
                        .try_pos(row, col)
                        .ok_or_else(|| TermError::Protocol("RA out of bounds".to_string()))?;
                    let ch = self.codec.decode_byte(ebcdic_byte);
                    let mut pos = self.screen.cursor() as usize;
                    while pos <= target && pos < self.screen.len() {
                        self.screen.write_char(pos, ch);
                        pos += 1;
                    }
                    self.screen.move_cursor(pos as u32);
                }
                Order::Data(byte) => {
                    let ch = self.codec.decode_byte(byte);
                    let pos = self.screen.cursor() as usize;
                    self.screen.write_char(pos, ch);
                    self.screen.move_cursor(self.screen.cursor() + 1);
                }
            }
        }

        if attrs_changed {
            self.rescan_fields();
        }
        if wcc.reset_mdt {
            self.mdt.clear();
        }

        let mut oia = self.oia.state();
        oia.keyboard_locked = wcc.lock_keyboard;
        oia.input_inhibited = wcc.lock_keyboard;
        oia.alarm_pending = wcc.sound_alarm;
        self.oia.apply(oia);

        Ok(())
    }

    fn clear_unit(&mut self) {
        self.screen.clear();
        self.fields.clear();
        self.mdt.clear();
        self.saved_screen = None;
        let mut oia = self.oia.state();
        oia.input_inhibited = false;
        oia.keyboard_locked = false;
        self.oia.apply(oia);
    }

    fn clear_format_table(&mut self) {
        self.fields.clear();
        self.mdt.clear();
    }

    fn write_error_code(&mut self, payload: &[u8]) {
        let code = match payload {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            [lo] => Some(*lo as u16),
            [] => None,
        };
        let mut oia = self.oia.state();
        oia.communication_error_code = code;
        oia.input_inhibited = true;
        self.oia.apply(oia);
    }

    fn roll(&mut self, payload: &[u8]) {
        let Some(&amount) = payload.first() else {
            return;
        };
        let amount = (amount as usize).min(self.screen.rows() as usize);
        let cols = self.screen.cols() as usize;
        let rows = self.screen.rows() as usize;

        for row in 0..rows {
            let src_row = row + amount;
            for col in 0..cols {
                let dst_pos = self.screen.pos(row as u16, col as u16);
                if src_row < rows {
                    let src_pos = self.screen.pos(src_row as u16, col as u16);
                    let ch = self.screen.char_at(src_pos);
                    self.screen.write_char(dst_pos, ch);
                } else {
                    self.screen.write_char(dst_pos, ' ');
                }
            }
        }
    }

    /// Assemble the outbound reply record for an AID keypress: the AID
    /// byte, the cursor position, and the relevant fields' contents keyed
    /// by their buffer address, per the active read mode.
    pub fn assemble_reply(&mut self, aid: Aid) -> Result<Vec<u8>, TermError> {
        self.state = VtState::Replying;
        let cursor = self.screen.cursor();
        let row = self.screen.row_of(cursor as usize);
        let col = self.screen.col_of(cursor as usize);

        let mut out = vec![aid.0, row as u8, col as u8];

        for f in &self.fields {
            let include = match self.read_mode {
                ReadMode::AllFields => true,
                ReadMode::MdtFieldsOnly => self.mdt.contains(&f.attr_pos),
            };
            if !include {
                continue;
            }
            let field_row = self.screen.row_of(f.data_pos);
            let field_col = self.screen.col_of(f.data_pos);
            let text = field::copy_field_to_string(&self.screen, f);
            let bytes = self.codec.encode(&text)?;
            out.push(field_row as u8);
            out.push(field_col as u8);
            out.push(bytes.len() as u8);
            out.extend(bytes);
        }

        self.state = VtState::Idle;
        Ok(out)
    }
}
