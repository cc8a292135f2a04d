//! Field table (C6): discovery and access for the input fields implied by
//! the screen's attribute plane.

use crate::error::TermError;
use crate::screen::{Screen, ATTR_FIELD_START, ATTR_NUMERIC, ATTR_PROTECTED};

/// One field discovered on the screen: the attribute-byte position, the
/// first data position (immediately after the attribute byte), and the
/// length up to (but not including) the next field-start attribute or the
/// end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Field {
    pub attr_pos: usize,
    pub data_pos: usize,
    pub len: usize,
    pub protected: bool,
    pub numeric: bool,
}

impl Field {
    pub fn end_pos(&self) -> usize {
        self.data_pos + self.len
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.data_pos && pos < self.end_pos()
    }
}

/// Scan the screen's attribute plane left-to-right, top-to-bottom and build
/// the field table. A byte with [`ATTR_FIELD_START`] set begins a field
/// running until the next field-start byte (wrapping to the first field at
/// the end of the buffer, as the hardware buffer is circular).
pub fn discover_fields(screen: &Screen) -> Vec<Field> {
    let len = screen.len();
    let mut starts = Vec::new();
    for pos in 0..len {
        if screen.attr_at(pos) & ATTR_FIELD_START != 0 {
            starts.push(pos);
        }
    }

    if starts.is_empty() {
        return Vec::new();
    }

    let mut fields = Vec::with_capacity(starts.len());
    for (i, &attr_pos) in starts.iter().enumerate() {
        let data_pos = (attr_pos + 1) % len;
        let next_start = starts[(i + 1) % starts.len()];
        let field_len = if next_start > attr_pos {
            next_start - attr_pos - 1
        } else {
            len - attr_pos - 1 + next_start
        };
        let attr = screen.attr_at(attr_pos);
        fields.push(Field {
            attr_pos,
            data_pos,
            len: field_len,
            protected: attr & ATTR_PROTECTED != 0,
            numeric: attr & ATTR_NUMERIC != 0,
        });
    }
    fields
}

/// Find the field (if any) whose data range contains `pos`.
pub fn find_by_position(fields: &[Field], pos: usize) -> Option<Field> {
    fields.iter().copied().find(|f| f.contains(pos))
}

/// Fields in reading order (the order [`discover_fields`] already produces,
/// since it scans left-to-right/top-to-bottom).
pub fn fields_in_reading_order(fields: &[Field]) -> Vec<Field> {
    fields.to_vec()
}

/// Read a field's data as a trimmed string.
pub fn copy_field_to_string(screen: &Screen, field: &Field) -> String {
    let mut out = String::with_capacity(field.len);
    let len = screen.len();
    for i in 0..field.len {
        let pos = (field.data_pos + i) % len;
        out.push(screen.char_at(pos));
    }
    out.trim_end().to_string()
}

/// Write `value` into a field, padding with spaces and truncating to the
/// field's length. Rejects protected fields and non-numeric input into
/// numeric-only fields. Returns the number of characters from `value` that
/// were actually accepted (`min(value.chars().count(), field.len)`), so a
/// caller can tell whether its input was truncated.
pub fn set_field(screen: &mut Screen, field: &Field, value: &str) -> Result<usize, TermError> {
    if field.protected {
        return Err(TermError::ProtectedField);
    }
    if field.numeric && !value.chars().all(|c| c.is_ascii_digit() || c == ' ') {
        return Err(TermError::NumericFieldViolation);
    }

    let len = screen.len();
    let mut chars: Vec<char> = value.chars().take(field.len).collect();
    let accepted = chars.len();
    chars.resize(field.len, ' ');

    for (i, ch) in chars.into_iter().enumerate() {
        let pos = (field.data_pos + i) % len;
        screen.write_char(pos, ch);
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenSize;

    fn screen_with_field(attr_pos: usize, attr: u8, text: &str) -> Screen {
        let mut screen = Screen::new(ScreenSize::Size24x80);
        screen.write_attr(attr_pos, attr | ATTR_FIELD_START);
        for (i, ch) in text.chars().enumerate() {
            screen.write_char(attr_pos + 1 + i, ch);
        }
        screen
    }

    #[test]
    fn single_field_wraps_around_to_fill_the_whole_buffer() {
        let screen = screen_with_field(10, 0, "HELLO");
        let fields = discover_fields(&screen);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].data_pos, 11);
        // A lone field occupies every cell except its own attribute byte,
        // wrapping circularly past the end of the buffer back to position 0.
        assert_eq!(fields[0].len, screen.len() - 1);
    }

    #[test]
    fn two_fields_split_at_their_boundaries() {
        let mut screen = Screen::new(ScreenSize::Size24x80);
        screen.write_attr(0, ATTR_FIELD_START);
        for (i, ch) in "USER".chars().enumerate() {
            screen.write_char(1 + i, ch);
        }
        screen.write_attr(20, ATTR_FIELD_START | ATTR_PROTECTED);
        for (i, ch) in "PASS".chars().enumerate() {
            screen.write_char(21 + i, ch);
        }

        let fields = discover_fields(&screen);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].len, 19);
        assert!(!fields[0].protected);
        assert!(fields[1].protected);
    }

    #[test]
    fn copy_field_trims_trailing_spaces() {
        let screen = screen_with_field(5, 0, "HI");
        let fields = discover_fields(&screen);
        assert_eq!(copy_field_to_string(&screen, &fields[0]), "HI");
    }

    #[test]
    fn set_field_rejects_protected() {
        let mut screen = screen_with_field(5, ATTR_PROTECTED, "");
        let fields = discover_fields(&screen);
        let result = set_field(&mut screen, &fields[0], "NEW");
        assert!(matches!(result, Err(TermError::ProtectedField)));
    }

    #[test]
    fn set_field_rejects_non_numeric_in_numeric_field() {
        let mut screen = screen_with_field(5, ATTR_NUMERIC, "");
        let fields = discover_fields(&screen);
        let result = set_field(&mut screen, &fields[0], "ABC");
        assert!(matches!(result, Err(TermError::NumericFieldViolation)));
    }

    #[test]
    fn set_field_truncates_and_pads() {
        let mut screen = Screen::new(ScreenSize::Size24x80);
        screen.write_attr(0, ATTR_FIELD_START);
        screen.write_attr(5, ATTR_FIELD_START);
        let fields = discover_fields(&screen);
        let accepted = set_field(&mut screen, &fields[0], "TOOLONG").unwrap();
        assert_eq!(accepted, fields[0].len);
        assert_eq!(copy_field_to_string(&screen, &fields[0]), "TOOL");
    }

    #[test]
    fn set_field_reports_accepted_char_count_when_value_fits() {
        let mut screen = Screen::new(ScreenSize::Size24x80);
        screen.write_attr(0, ATTR_FIELD_START);
        screen.write_attr(5, ATTR_FIELD_START);
        let fields = discover_fields(&screen);
        let accepted = set_field(&mut screen, &fields[0], "HI").unwrap();
        assert_eq!(accepted, 2);
    }

    #[test]
    fn find_by_position_locates_containing_field() {
        let screen = screen_with_field(5, 0, "HELLO");
        let fields = discover_fields(&screen);
        assert!(find_by_position(&fields, 7).is_some());
        assert!(find_by_position(&fields, 5).is_none());
    }

    #[test]
    fn no_field_start_bytes_yields_empty_table() {
        let screen = Screen::new(ScreenSize::Size24x80);
        assert!(discover_fields(&screen).is_empty());
    }
}
