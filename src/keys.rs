//! Keyboard input mnemonics: translates the strings a caller passes to
//! `Session::send_keys` into AID bytes and navigation actions.

use crate::error::TermError;

/// An Attention Identifier byte, sent to the host to indicate which key
/// ended a read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aid(pub u8);

impl Aid {
    pub const ENTER: Aid = Aid(0xF1);
    pub const CLEAR: Aid = Aid(0xBD);
    pub const HELP: Aid = Aid(0xF3);
    pub const PA1: Aid = Aid(0x6C);
    pub const PA2: Aid = Aid(0x6E);
    pub const PA3: Aid = Aid(0x6B);

    /// PF1-PF24, per the conventional 5250 AID byte assignment.
    pub fn pf(n: u8) -> Option<Aid> {
        const PF_BYTES: [u8; 24] = [
            0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0xB1, 0xB2,
            0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xBB, 0xBC,
        ];
        if (1..=24).contains(&n) {
            Some(Aid(PF_BYTES[(n - 1) as usize]))
        } else {
            None
        }
    }
}

/// A single unit of parsed keyboard input: either an AID key that ends a
/// read cycle, or a non-AID navigation action that moves within the
/// current field without ending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Aid(Aid),
    Tab,
    BackTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    EraseToEndOfField,
    Char(char),
}

/// Parse a `send_keys` string into a sequence of actions. Bracketed tokens
/// (`[tab]`, `[pf3]`, ...) are mnemonics; any other character is typed
/// literally into the current field.
pub fn parse_keys(input: &str) -> Result<Vec<KeyAction>, TermError> {
    let mut actions = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' {
            let mut token = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == ']' {
                    closed = true;
                    break;
                }
                token.push(c);
            }
            if !closed {
                return Err(TermError::Protocol(format!(
                    "unterminated key mnemonic: [{token}"
                )));
            }
            actions.push(mnemonic_to_action(&token)?);
        } else {
            actions.push(KeyAction::Char(ch));
        }
    }

    Ok(actions)
}

fn mnemonic_to_action(token: &str) -> Result<KeyAction, TermError> {
    let lower = token.to_ascii_lowercase();
    match lower.as_str() {
        "enter" => Ok(KeyAction::Aid(Aid::ENTER)),
        "clear" => Ok(KeyAction::Aid(Aid::CLEAR)),
        "help" => Ok(KeyAction::Aid(Aid::HELP)),
        "pa1" => Ok(KeyAction::Aid(Aid::PA1)),
        "pa2" => Ok(KeyAction::Aid(Aid::PA2)),
        "pa3" => Ok(KeyAction::Aid(Aid::PA3)),
        "tab" => Ok(KeyAction::Tab),
        "backtab" => Ok(KeyAction::BackTab),
        "up" => Ok(KeyAction::Up),
        "down" => Ok(KeyAction::Down),
        "left" => Ok(KeyAction::Left),
        "right" => Ok(KeyAction::Right),
        "home" => Ok(KeyAction::Home),
        "erof" => Ok(KeyAction::EraseToEndOfField),
        _ if lower.starts_with("pf") => {
            let n: u8 = lower[2..]
                .parse()
                .map_err(|_| TermError::Protocol(format!("unknown key mnemonic: [{token}]")))?;
            Aid::pf(n)
                .map(KeyAction::Aid)
                .ok_or_else(|| TermError::Protocol(format!("unknown key mnemonic: [{token}]")))
        }
        _ => Err(TermError::Protocol(format!(
            "unknown key mnemonic: [{token}]"
        ))),
    }
}

/// The trailing AID in a parsed action sequence, if the sequence ends a
/// read cycle. `send_keys` requires exactly one AID, and only as the last
/// action.
pub fn trailing_aid(actions: &[KeyAction]) -> Option<Aid> {
    match actions.last() {
        Some(KeyAction::Aid(aid)) => Some(*aid),
        _ => None,
    }
}

/// Validate that at most one AID appears, and only as the final action.
pub fn validate_single_aid(actions: &[KeyAction]) -> Result<(), TermError> {
    let aid_count = actions
        .iter()
        .filter(|a| matches!(a, KeyAction::Aid(_)))
        .count();
    if aid_count > 1 {
        return Err(TermError::MultipleAid);
    }
    if aid_count == 1 && !matches!(actions.last(), Some(KeyAction::Aid(_))) {
        return Err(TermError::Protocol(
            "AID key must be the final action in send_keys".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_text_as_chars() {
        let actions = parse_keys("hi").unwrap();
        assert_eq!(actions, vec![KeyAction::Char('h'), KeyAction::Char('i')]);
    }

    #[test]
    fn parses_enter_mnemonic() {
        let actions = parse_keys("[enter]").unwrap();
        assert_eq!(actions, vec![KeyAction::Aid(Aid::ENTER)]);
    }

    #[test]
    fn parses_pf_mnemonics_case_insensitively() {
        let actions = parse_keys("[PF3]").unwrap();
        assert_eq!(actions, vec![KeyAction::Aid(Aid::pf(3).unwrap())]);
    }

    #[test]
    fn mixed_text_and_mnemonics() {
        let actions = parse_keys("USER001[tab]PASS[enter]").unwrap();
        assert_eq!(actions.len(), "USER001".len() + 1 + "PASS".len() + 1);
        assert_eq!(actions.last(), Some(&KeyAction::Aid(Aid::ENTER)));
    }

    #[test]
    fn unterminated_mnemonic_is_an_error() {
        assert!(parse_keys("[enter").is_err());
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        assert!(parse_keys("[bogus]").is_err());
    }

    #[test]
    fn multiple_aid_keys_are_rejected() {
        let actions = parse_keys("[enter][clear]").unwrap();
        assert!(matches!(
            validate_single_aid(&actions),
            Err(TermError::MultipleAid)
        ));
    }

    #[test]
    fn aid_must_be_final_action() {
        let actions = parse_keys("[enter]x").unwrap();
        assert!(validate_single_aid(&actions).is_err());
    }

    #[test]
    fn pf_out_of_range_is_rejected() {
        assert!(Aid::pf(25).is_none());
        assert!(Aid::pf(0).is_none());
    }
}
