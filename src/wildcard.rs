//! Per-position alphabets for key patterns
//!
//! A wildcard is the ordered set of characters legal at one bracketed position
//! of a key template, plus a cursor marking enumeration progress. Wildcards are
//! plain owned values: cloning one yields an independent cursor.

use std::fmt;
use std::ops::Range;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::ToPrimitive;

use crate::error::{PatternError, Result};

/// Characters that cannot be members of a character class
pub const RESERVED: [char; 4] = ['-', '[', ']', '*'];

/// Check whether a character is reserved by the pattern syntax
#[inline]
pub fn is_reserved(ch: char) -> bool {
    RESERVED.contains(&ch)
}

/// An ordered alphabet bound to one pattern position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wildcard {
    chars: Vec<char>,
    counter: usize,
}

impl Wildcard {
    /// Parse a bracket expression (`[A-Z0-9]`, `[abc]`) or a single bare character
    ///
    /// With a `reference`, a range `x-y` selects the reference's characters
    /// from `x` through `y` by their position in the reference, so a
    /// sub-alphabet always follows its parent's ordering. Every character
    /// named must then exist in the reference.
    ///
    /// # Example
    ///
    /// ```
    /// use keyspace_pool::Wildcard;
    ///
    /// let full = Wildcard::parse("[0-9A-F]", None).unwrap();
    /// assert_eq!(full.len(), 16);
    ///
    /// // '8' through 'B' in the parent's order
    /// let sub = Wildcard::parse("[8-B]", Some(&full)).unwrap();
    /// assert_eq!(sub.chars(), &['8', '9', 'A', 'B']);
    /// ```
    pub fn parse(expr: &str, reference: Option<&Wildcard>) -> Result<Self> {
        let body: Vec<char> = if let Some(inner) = expr.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| PatternError::wildcard(expr, "missing closing ']'"))?;
            inner.chars().collect()
        } else {
            let mut chars = expr.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => vec![ch],
                _ => {
                    return Err(PatternError::wildcard(
                        expr,
                        "expected a bracket expression or a single character",
                    ))
                }
            }
        };

        if body.is_empty() {
            return Err(PatternError::wildcard(expr, "character class is empty"));
        }

        // Members as (start, end) pairs; single characters have start == end
        let mut members = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let start = body[i];
            if is_reserved(start) {
                return Err(PatternError::wildcard(
                    expr,
                    format!("reserved character '{start}' in class"),
                ));
            }

            if body.get(i + 1) == Some(&'-') {
                let end = *body
                    .get(i + 2)
                    .ok_or_else(|| PatternError::wildcard(expr, "dangling '-'"))?;
                if is_reserved(end) {
                    return Err(PatternError::wildcard(
                        expr,
                        format!("reserved character '{end}' in class"),
                    ));
                }
                members.push((start, end));
                i += 3;
            } else {
                members.push((start, start));
                i += 1;
            }
        }

        let chars = match reference {
            None => {
                let mut chars = Vec::new();
                for (start, end) in members {
                    if start > end {
                        return Err(PatternError::wildcard(
                            expr,
                            format!("inverted range '{start}-{end}'"),
                        ));
                    }
                    chars.extend((start..=end).filter(|&ch| !is_reserved(ch)));
                }
                chars.sort_unstable();
                chars.dedup();
                chars
            }
            Some(reference) => {
                let locate = |ch: char| {
                    reference.position(ch).ok_or_else(|| {
                        PatternError::wildcard(
                            expr,
                            format!("'{ch}' not in reference {}", reference.representation()),
                        )
                    })
                };

                let mut indices = Vec::new();
                for (start, end) in members {
                    let (from, to) = (locate(start)?, locate(end)?);
                    if from > to {
                        return Err(PatternError::wildcard(
                            expr,
                            format!("inverted range '{start}-{end}'"),
                        ));
                    }
                    indices.extend(from..=to);
                }
                indices.sort_unstable();
                indices.dedup();
                indices.into_iter().map(|idx| reference.chars[idx]).collect()
            }
        };

        Ok(Self::from_chars(chars))
    }

    /// Build a wildcard from characters that are already ordered and unique
    pub(crate) fn from_chars(chars: Vec<char>) -> Self {
        debug_assert!(!chars.is_empty());
        Self { chars, counter: 0 }
    }

    /// Number of characters (size of this position's key space)
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false for a parsed wildcard
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Current cursor position
    #[inline]
    pub fn count(&self) -> usize {
        self.counter
    }

    /// Characters not yet visited, including the current one
    #[inline]
    pub fn remaining(&self) -> usize {
        self.chars.len() - self.counter
    }

    /// The ordered characters
    #[inline]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Character under the cursor
    #[inline]
    pub fn current(&self) -> char {
        self.chars[self.counter]
    }

    /// Character at a given offset
    #[inline]
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    /// Offset of a character in this alphabet
    pub fn position(&self, ch: char) -> Option<usize> {
        self.chars.iter().position(|&c| c == ch)
    }

    /// Advance the cursor by one; returns `true` when it wrapped (carry)
    pub fn succ(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.chars.len() {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Advance the cursor by `n`; returns the carry `(count + n) / len`
    pub fn add(&mut self, n: &BigUint) -> BigUint {
        let total = BigUint::from(self.counter) + n;
        let (carry, offset) = total.div_rem(&BigUint::from(self.chars.len()));
        // offset < len, always fits
        self.counter = offset.to_usize().unwrap_or_default();
        carry
    }

    /// Move the cursor back to the first character
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Bisect the unvisited characters; `None` if fewer than two remain
    ///
    /// The first half receives `floor(remaining / 2)` characters. Both halves
    /// start with a fresh cursor.
    pub fn split(&self) -> Option<(Wildcard, Wildcard)> {
        let unvisited = &self.chars[self.counter..];
        if unvisited.len() < 2 {
            return None;
        }

        let mid = unvisited.len() / 2;
        Some((
            Self::from_chars(unvisited[..mid].to_vec()),
            Self::from_chars(unvisited[mid..].to_vec()),
        ))
    }

    /// Contiguous sub-alphabet with a fresh cursor
    pub(crate) fn slice(&self, range: Range<usize>) -> Wildcard {
        Self::from_chars(self.chars[range].to_vec())
    }

    /// The single-character alphabet holding the current character
    pub(crate) fn pinned(&self) -> Wildcard {
        Self::from_chars(vec![self.current()])
    }

    /// True iff every character of `other` appears in this alphabet
    pub fn contains(&self, other: &Wildcard) -> bool {
        other.chars.iter().all(|ch| self.chars.contains(ch))
    }

    /// Render back to bracket notation, collapsing consecutive runs into ranges
    ///
    /// # Example
    ///
    /// ```
    /// use keyspace_pool::Wildcard;
    ///
    /// let wc = Wildcard::parse("[a-c0-3x]", None).unwrap();
    /// assert_eq!(wc.representation(), "[0-3a-cx]");
    /// ```
    pub fn representation(&self) -> String {
        let mut out = String::from("[");
        let mut i = 0;
        while i < self.chars.len() {
            let start = i;
            while i + 1 < self.chars.len()
                && self.chars[i + 1] as u32 == self.chars[i] as u32 + 1
            {
                i += 1;
            }

            out.push(self.chars[start]);
            if i > start {
                out.push('-');
                out.push(self.chars[i]);
            }
            i += 1;
        }
        out.push(']');
        out
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.representation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc(expr: &str) -> Wildcard {
        Wildcard::parse(expr, None).unwrap()
    }

    #[test]
    fn test_parse_ranges_and_singles() {
        let w = wc("[A-C0-1x]");
        assert_eq!(w.chars(), &['0', '1', 'A', 'B', 'C', 'x']);
        assert_eq!(w.len(), 6);
        assert_eq!(w.count(), 0);
    }

    #[test]
    fn test_parse_deduplicates() {
        let w = wc("[a-ccb-d]");
        assert_eq!(w.chars(), &['a', 'b', 'c', 'd']);
    }

    #[test]
    fn test_parse_bare_character() {
        let w = wc("Q");
        assert_eq!(w.chars(), &['Q']);
        assert!(Wildcard::parse("QQ", None).is_err());
        assert!(Wildcard::parse("*", None).is_err());
    }

    #[test]
    fn test_parse_invalid() {
        for expr in ["[Z-A]", "[]", "[A-]", "[-A]", "[A*]", "[A", "[A[B]"] {
            let err = Wildcard::parse(expr, None).unwrap_err();
            assert!(
                matches!(err, PatternError::InvalidWildcard { .. }),
                "{expr} should be an invalid wildcard, got {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_with_reference() {
        let full = wc("[0-9A-Z]");
        let sub = Wildcard::parse("[8-B]", Some(&full)).unwrap();
        assert_eq!(sub.chars(), &['8', '9', 'A', 'B']);

        // Outside the reference
        assert!(Wildcard::parse("[a-b]", Some(&full)).is_err());
        // Inverted by reference position
        assert!(Wildcard::parse("[B-8]", Some(&full)).is_err());
        // Singles must exist too
        assert!(Wildcard::parse("z", Some(&full)).is_err());
    }

    #[test]
    fn test_succ_wraps() {
        let mut w = wc("[a-c]");
        assert!(!w.succ());
        assert_eq!(w.current(), 'b');
        assert!(!w.succ());
        assert!(w.succ());
        assert_eq!(w.current(), 'a');
    }

    #[test]
    fn test_add_carry() {
        let mut w = wc("[0-9]");
        w.succ();
        w.succ();
        let carry = w.add(&BigUint::from(25u32));
        assert_eq!(carry, BigUint::from(2u32));
        assert_eq!(w.current(), '7');
    }

    #[test]
    fn test_split_remaining() {
        let mut w = wc("[a-e]");
        w.succ();
        let (a, b) = w.split().unwrap();
        assert_eq!(a.chars(), &['b', 'c']);
        assert_eq!(b.chars(), &['d', 'e']);
        assert_eq!(a.count(), 0);

        let mut last = wc("[ab]");
        last.succ();
        assert!(last.split().is_none());
    }

    #[test]
    fn test_contains() {
        let full = wc("[A-Z]");
        assert!(full.contains(&wc("[C-F]")));
        assert!(full.contains(&wc("Q")));
        assert!(!full.contains(&wc("[Y-a]")));
    }

    #[test]
    fn test_representation_round_trip() {
        for expr in ["[A-Z]", "[ace]", "[0-9A-Fa-f]", "[X]", "[ab]"] {
            let w = wc(expr);
            let back = wc(&w.representation());
            assert_eq!(back.chars(), w.chars(), "round trip of {expr}");
        }
        assert_eq!(wc("[ace]").representation(), "[ace]");
        assert_eq!(wc("[ab]").representation(), "[a-b]");
    }
}
