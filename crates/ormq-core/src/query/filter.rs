//! SQL LIKE pattern matching.

use std::iter::Peekable;
use std::str::Chars;

/// Match a value against a SQL LIKE pattern.
///
/// `%` matches any run of characters (including none), `_` matches exactly
/// one, and `\` escapes the next pattern character.
pub fn like_match(value: &str, pattern: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        let value = value.to_lowercase();
        let pattern = pattern.to_lowercase();
        return like_match_recursive(&mut value.chars().peekable(), &mut pattern.chars().peekable());
    }
    like_match_recursive(&mut value.chars().peekable(), &mut pattern.chars().peekable())
}

fn like_match_recursive(chars: &mut Peekable<Chars>, pattern: &mut Peekable<Chars>) -> bool {
    loop {
        match (pattern.peek().copied(), chars.peek().copied()) {
            (None, None) => return true,
            (None, Some(_)) => return false,
            (Some('%'), _) => {
                pattern.next();
                if pattern.peek().is_none() {
                    return true;
                }
                // Try matching % with 0, 1, 2, ... characters
                loop {
                    let mut pattern_clone = pattern.clone();
                    let mut chars_clone = chars.clone();
                    if like_match_recursive(&mut chars_clone, &mut pattern_clone) {
                        return true;
                    }
                    if chars.next().is_none() {
                        return false;
                    }
                }
            }
            (Some('_'), Some(_)) => {
                pattern.next();
                chars.next();
            }
            (Some('_'), None) => return false,
            (Some('\\'), _) => {
                pattern.next();
                match (pattern.peek().copied(), chars.peek().copied()) {
                    (Some(p), Some(c)) if p == c => {
                        pattern.next();
                        chars.next();
                    }
                    _ => return false,
                }
            }
            (Some(p), Some(c)) => {
                if p != c {
                    return false;
                }
                pattern.next();
                chars.next();
            }
            (Some(_), None) => return false,
        }
    }
}
