//! Wait-plus-search predicates for `Session::wait_for`.

use crate::field::Field;
use crate::oia::Oia;
use crate::screen::{DirtyRegion, Screen};

/// A region of the screen to restrict a `TextPresent` search to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub top: u16,
    pub left: u16,
    pub bottom: u16,
    pub right: u16,
}

impl From<DirtyRegion> for Region {
    fn from(r: DirtyRegion) -> Self {
        Self {
            top: r.top,
            left: r.left,
            bottom: r.bottom,
            right: r.right,
        }
    }
}

/// Predicates a caller may wait on. Composed with `And` to require several
/// conditions to hold simultaneously (the "wait plus search" rule: a
/// keyboard-unlock alone is never sufficient if the caller also names a
/// text predicate).
#[derive(Debug, Clone)]
pub enum WaitPredicate {
    KeyboardUnlock,
    /// OIA transitions from locked to unlocked at least once during the
    /// wait window (as opposed to `KeyboardUnlock`, which is satisfied by
    /// an already-unlocked keyboard).
    KeyboardLockCycle,
    TextPresent(String, Option<Region>),
    FieldEquals(usize, String),
    And(Box<WaitPredicate>, Box<WaitPredicate>),
}

impl WaitPredicate {
    pub fn and(self, other: WaitPredicate) -> WaitPredicate {
        WaitPredicate::And(Box::new(self), Box::new(other))
    }
}

/// Tracks state across repeated `evaluate` calls that a one-shot snapshot
/// can't answer (e.g. "has the keyboard gone through a lock cycle").
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitHistory {
    was_locked: bool,
    saw_lock_cycle: bool,
}

impl WaitHistory {
    pub fn observe(&mut self, oia: &Oia) {
        if oia.keyboard_locked {
            self.was_locked = true;
        } else if self.was_locked {
            self.saw_lock_cycle = true;
        }
    }
}

pub fn evaluate(
    predicate: &WaitPredicate,
    screen: &Screen,
    oia: &Oia,
    fields: &[Field],
    history: &WaitHistory,
) -> bool {
    match predicate {
        WaitPredicate::KeyboardUnlock => !oia.keyboard_locked,
        WaitPredicate::KeyboardLockCycle => history.saw_lock_cycle && !oia.keyboard_locked,
        WaitPredicate::TextPresent(needle, region) => match region {
            None => screen.text_contains(needle),
            Some(r) => text_present_in_region(screen, needle, r),
        },
        WaitPredicate::FieldEquals(index, expected) => fields
            .get(*index)
            .map(|f| crate::field::copy_field_to_string(screen, f) == *expected)
            .unwrap_or(false),
        WaitPredicate::And(a, b) => {
            evaluate(a, screen, oia, fields, history) && evaluate(b, screen, oia, fields, history)
        }
    }
}

fn text_present_in_region(screen: &Screen, needle: &str, region: &Region) -> bool {
    for row in region.top..=region.bottom.min(screen.rows().saturating_sub(1)) {
        let start = screen.pos(row, region.left);
        let end = screen.pos(row, region.right.min(screen.cols() - 1)) + 1;
        let line: String = (start..end).map(|p| screen.char_at(p)).collect();
        if line.contains(needle) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenSize;

    #[test]
    fn keyboard_unlock_holds_when_not_locked() {
        let screen = Screen::new(ScreenSize::Size24x80);
        let oia = Oia::default();
        let history = WaitHistory::default();
        assert!(evaluate(
            &WaitPredicate::KeyboardUnlock,
            &screen,
            &oia,
            &[],
            &history
        ));
    }

    #[test]
    fn lock_cycle_requires_observed_transition() {
        let screen = Screen::new(ScreenSize::Size24x80);
        let mut oia = Oia::default();
        let mut history = WaitHistory::default();
        oia.keyboard_locked = true;
        history.observe(&oia);
        assert!(!evaluate(
            &WaitPredicate::KeyboardLockCycle,
            &screen,
            &oia,
            &[],
            &history
        ));

        oia.keyboard_locked = false;
        history.observe(&oia);
        assert!(evaluate(
            &WaitPredicate::KeyboardLockCycle,
            &screen,
            &oia,
            &[],
            &history
        ));
    }

    #[test]
    fn and_requires_both_predicates() {
        let mut screen = Screen::new(ScreenSize::Size24x80);
        for (i, ch) in "READY".chars().enumerate() {
            screen.write_char(i, ch);
        }
        let mut oia = Oia::default();
        oia.keyboard_locked = true;
        let history = WaitHistory::default();

        let predicate =
            WaitPredicate::KeyboardUnlock.and(WaitPredicate::TextPresent("READY".to_string(), None));
        assert!(!evaluate(&predicate, &screen, &oia, &[], &history));

        oia.keyboard_locked = false;
        assert!(evaluate(&predicate, &screen, &oia, &[], &history));
    }

    #[test]
    fn text_present_respects_region_bounds() {
        let mut screen = Screen::new(ScreenSize::Size24x80);
        let pos = screen.pos(3, 0);
        for (i, ch) in "HELLO".chars().enumerate() {
            screen.write_char(pos + i, ch);
        }
        let region = Region {
            top: 0,
            left: 0,
            bottom: 2,
            right: 79,
        };
        assert!(!text_present_in_region(&screen, "HELLO", &region));

        let region2 = Region {
            top: 3,
            left: 0,
            bottom: 3,
            right: 79,
        };
        assert!(text_present_in_region(&screen, "HELLO", &region2));
    }
}
