//! Structural masks for eyeballing the formats availability text comes in.
//!
//! Every char is classed as `N` (numeric), `L` (alphabetic) or `S` (anything else), checked in
//! that order, and runs of one class collapse into a single letter: `"Skladem 42 ks"` is
//! `"LSNSL"`.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Number,
    Letter,
    Symbol,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_numeric() {
            CharClass::Number
        } else if c.is_alphabetic() {
            CharClass::Letter
        } else {
            CharClass::Symbol
        }
    }

    fn marker(self) -> char {
        match self {
            CharClass::Number => 'N',
            CharClass::Letter => 'L',
            CharClass::Symbol => 'S',
        }
    }
}

/// Mask of a single string. The empty string has the empty mask.
pub fn mask(s: &str) -> String {
    let mut out = String::new();
    let mut last = None;
    for class in s.chars().map(CharClass::of) {
        if last != Some(class) {
            out.push(class.marker());
            last = Some(class);
        }
    }
    out
}

/// Set of distinct masks over all `strings`.
pub fn unique_masks<I, S>(strings: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    strings.into_iter().map(|s| mask(s.as_ref())).collect()
}
