//! EBCDIC⇄Unicode codec registry (C1).
//!
//! Maps a numeric CCSID tag to an immutable [`Codec`]. Single-byte code
//! pages expose a bijective byte⇄scalar table; the one double-byte code
//! page (930) additionally tracks shift state via [`dbcs::Dbcs930Decoder`].

pub mod dbcs;
pub mod tables;

use crate::error::TermError;
use tables::SbcsTable;

/// A single-byte EBCDIC code page, immutable once constructed.
#[derive(Debug, Clone)]
pub struct SbcsCodec {
    ccsid: u16,
    decode_table: SbcsTable,
}

impl SbcsCodec {
    fn new(ccsid: u16, decode_table: SbcsTable) -> Self {
        Self { ccsid, decode_table }
    }

    pub fn ccsid(&self) -> u16 {
        self.ccsid
    }

    /// Decode a single EBCDIC byte to its Unicode scalar. Always succeeds:
    /// every byte has an assigned scalar in a well-formed table.
    pub fn decode_byte(&self, byte: u8) -> char {
        self.decode_table[byte as usize]
    }

    /// Decode a full byte slice.
    pub fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.decode_byte(b)).collect()
    }

    /// Encode a single Unicode scalar to its EBCDIC byte.
    pub fn encode_char(&self, ch: char) -> Result<u8, TermError> {
        self.decode_table
            .iter()
            .position(|&c| c == ch)
            .map(|pos| pos as u8)
            .ok_or(TermError::ConversionError {
                ccsid: self.ccsid,
                scalar: ch as u32,
            })
    }

    /// Encode a full string, failing on the first unmappable scalar.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, TermError> {
        text.chars().map(|c| self.encode_char(c)).collect()
    }
}

/// Look up the codec for a CCSID. Fails with [`TermError::UnknownCcsid`] for
/// any CCSID the registry does not carry a table for, including 930 (use
/// [`dbcs::Dbcs930Decoder`] directly for that one, since it is stateful).
pub fn lookup(ccsid: u16) -> Result<SbcsCodec, TermError> {
    tables::table_for_ccsid(ccsid)
        .map(|table| SbcsCodec::new(ccsid, table))
        .ok_or(TermError::UnknownCcsid(ccsid))
}

/// Whether a CCSID is a double-byte code page requiring
/// [`dbcs::Dbcs930Decoder`] rather than [`SbcsCodec`].
pub fn is_dbcs(ccsid: u16) -> bool {
    ccsid == 930
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbcs_round_trip_holds_for_every_byte() {
        for ccsid in [37u16, 277, 285, 500, 871, 1112, 1141] {
            let codec = lookup(ccsid).unwrap();
            for byte in 0u16..256 {
                let byte = byte as u8;
                let scalar = codec.decode_byte(byte);
                assert_eq!(codec.encode_char(scalar).unwrap(), byte, "ccsid {ccsid}");
            }
        }
    }

    #[test]
    fn unmapped_scalar_fails_with_conversion_error() {
        let codec = lookup(37).unwrap();
        let result = codec.encode_char('\u{FFFF}');
        assert!(matches!(
            result,
            Err(TermError::ConversionError { ccsid: 37, scalar }) if scalar == 0xFFFF
        ));
    }

    #[test]
    fn unknown_ccsid_is_rejected() {
        assert!(matches!(lookup(12345), Err(TermError::UnknownCcsid(12345))));
    }

    #[test]
    fn ccsid_930_is_flagged_dbcs_not_sbcs() {
        assert!(is_dbcs(930));
        assert!(lookup(930).is_err());
    }
}
