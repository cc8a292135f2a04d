//! Double-byte (DBCS) codec support for CCSID 930 (Japan, Katakana/Kanji
//! extended), shift-controlled per the IBM 5250 DBCS convention.
//!
//! A DBCS stream is single-byte EBCDIC (CCSID 290, approximated here by the
//! same base table as CCSID 37) everywhere outside an `SI ... SO` bracket.
//! Inside the bracket, bytes are consumed two at a time and looked up in a
//! packed 16-bit table. The decoder is stateful; the encoder is its inverse.

use super::tables::{ccsid_37, SbcsTable};
use crate::error::TermError;

/// Shift-In: enter DBCS mode
pub const SI: u8 = 0x0E;
/// Shift-Out: leave DBCS mode
pub const SO: u8 = 0x0F;

/// Sentinel returned by the decoder after consuming the first byte of a
/// DBCS pair, signaling "no character yet" to the caller.
pub const PENDING: char = '\u{0}';

fn double_byte_table() -> Vec<(u16, char)> {
    // A representative subset of JIS X 0208 Katakana/symbol code points,
    // packed as (lead_byte << 8 | trail_byte) -> Unicode scalar.
    vec![
        (0x4040, '\u{3000}'), // ideographic space
        (0x4142, 'ア'),
        (0x4144, 'イ'),
        (0x4146, 'ウ'),
        (0x4148, 'エ'),
        (0x414A, 'オ'),
        (0x425B, 'カ'),
        (0x425D, 'キ'),
        (0x425F, 'ク'),
        (0x4260, 'ケ'),
        (0x4361, '漢'),
        (0x4362, '字'),
    ]
}

/// Stateful DBCS decoder for CCSID 930.
#[derive(Debug, Clone)]
pub struct Dbcs930Decoder {
    sbcs: SbcsTable,
    double_byte: Vec<(u16, char)>,
    dbcs_active: bool,
    awaiting_second_byte: bool,
    pending_lead: u8,
}

impl Dbcs930Decoder {
    pub fn new() -> Self {
        Self {
            sbcs: ccsid_37(),
            double_byte: double_byte_table(),
            dbcs_active: false,
            awaiting_second_byte: false,
            pending_lead: 0,
        }
    }

    pub fn dbcs_active(&self) -> bool {
        self.dbcs_active
    }

    pub fn awaiting_second_byte(&self) -> bool {
        self.awaiting_second_byte
    }

    /// Feed one byte, returning the decoded character if a complete unit
    /// (single EBCDIC byte, or DBCS pair) has now been assembled, or
    /// [`PENDING`] if this was the first byte of a DBCS pair.
    pub fn feed(&mut self, byte: u8) -> Result<char, TermError> {
        if byte == SI {
            self.dbcs_active = true;
            self.awaiting_second_byte = false;
            return Ok(PENDING);
        }
        if byte == SO {
            self.dbcs_active = false;
            self.awaiting_second_byte = false;
            return Ok(PENDING);
        }

        if self.dbcs_active {
            if self.awaiting_second_byte {
                let packed = ((self.pending_lead as u16) << 8) | byte as u16;
                self.awaiting_second_byte = false;
                return self
                    .double_byte
                    .iter()
                    .find(|(code, _)| *code == packed)
                    .map(|(_, ch)| *ch)
                    .ok_or(TermError::ConversionError {
                        ccsid: 930,
                        scalar: packed as u32,
                    });
            } else {
                self.pending_lead = byte;
                self.awaiting_second_byte = true;
                return Ok(PENDING);
            }
        }

        Ok(self.sbcs[byte as usize])
    }

    /// Decode a complete byte stream, returning all non-pending scalars in
    /// order. Used by callers that don't need incremental feeding.
    pub fn decode_stream(&mut self, bytes: &[u8]) -> Result<Vec<char>, TermError> {
        let mut out = Vec::new();
        for &byte in bytes {
            let ch = self.feed(byte)?;
            if ch != PENDING {
                out.push(ch);
            }
        }
        Ok(out)
    }

    pub fn reset(&mut self) {
        self.dbcs_active = false;
        self.awaiting_second_byte = false;
        self.pending_lead = 0;
    }
}

impl Default for Dbcs930Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a sequence of scalars back into CCSID 930 EBCDIC bytes, wrapping
/// any run of DBCS-only scalars in SI/SO.
pub fn encode_930(scalars: &[char]) -> Result<Vec<u8>, TermError> {
    let sbcs = ccsid_37();
    let double_byte = double_byte_table();
    let mut out = Vec::new();
    let mut in_dbcs = false;

    for &ch in scalars {
        if let Some((packed, _)) = double_byte.iter().find(|(_, c)| *c == ch) {
            if !in_dbcs {
                out.push(SI);
                in_dbcs = true;
            }
            out.push((*packed >> 8) as u8);
            out.push((*packed & 0xFF) as u8);
        } else {
            if in_dbcs {
                out.push(SO);
                in_dbcs = false;
            }
            let byte = sbcs
                .iter()
                .position(|&c| c == ch)
                .ok_or(TermError::ConversionError {
                    ccsid: 930,
                    scalar: ch as u32,
                })?;
            out.push(byte as u8);
        }
    }

    if in_dbcs {
        out.push(SO);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbcs_pair_decodes_to_one_scalar_and_resets_state() {
        let mut decoder = Dbcs930Decoder::new();
        let scalars = decoder.decode_stream(&[SI, 0x41, 0x42, SO]).unwrap();
        assert_eq!(scalars, vec!['ア']);
        assert!(!decoder.dbcs_active());
        assert!(!decoder.awaiting_second_byte());
    }

    #[test]
    fn first_dbcs_byte_sets_awaiting_flag() {
        let mut decoder = Dbcs930Decoder::new();
        assert_eq!(decoder.feed(SI).unwrap(), PENDING);
        assert_eq!(decoder.feed(0x41).unwrap(), PENDING);
        assert!(decoder.awaiting_second_byte());
    }

    #[test]
    fn sbcs_bytes_pass_through_outside_dbcs_mode() {
        let mut decoder = Dbcs930Decoder::new();
        let scalars = decoder.decode_stream(&[0x40]).unwrap(); // EBCDIC space
        assert_eq!(scalars, vec![' ']);
    }

    #[test]
    fn decode_stream_returns_single_scalar_for_spec_s4_bytes() {
        let mut decoder = Dbcs930Decoder::new();
        let scalars = decoder.decode_stream(&[SI, 0x42, 0x60, SO]).unwrap();
        assert_eq!(scalars, vec!['ケ']);
        assert!(!decoder.dbcs_active());
    }

    #[test]
    fn unmapped_dbcs_pair_fails_with_conversion_error() {
        let mut decoder = Dbcs930Decoder::new();
        let result = decoder.decode_stream(&[SI, 0xFF, 0xFF, SO]);
        assert!(matches!(result, Err(TermError::ConversionError { ccsid: 930, .. })));
    }

    #[test]
    fn encode_round_trips_dbcs_scalar() {
        let bytes = encode_930(&['ア']).unwrap();
        assert_eq!(bytes[0], SI);
        assert_eq!(*bytes.last().unwrap(), SO);

        let mut decoder = Dbcs930Decoder::new();
        let scalars = decoder.decode_stream(&bytes).unwrap();
        assert_eq!(scalars, vec!['ア']);
    }
}
