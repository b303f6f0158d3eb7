//! Key pattern parsing, enumeration and bisection
//!
//! A template interleaves literal characters with bracketed character classes:
//! `AB[C-F]D[0-9]` describes 4 × 10 keys. Each class becomes a [`Wildcard`]
//! with its own cursor, and the pattern enumerates keys like an odometer: the
//! rightmost wildcard moves fastest and carries leftward when it wraps.
//!
//! # Wildcard keys
//!
//! A wildcard key restricts a template position by position. Literals must
//! match the template; each class slot is one of:
//!
//! - `*` - the full template class
//! - a single character - one value from the class
//! - a bracket subset, e.g. `[C-D]` - ranges resolve by position in the class
//!
//! `AB*D[0-4]` restricts `AB[C-F]D[0-9]` to 4 × 5 keys.

use std::fmt;
use std::sync::Arc;

use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{PatternError, Result};
use crate::keyspace::{calculate_keyspace, digits_to_index, index_to_digits};
use crate::movement::KeyMovement;
use crate::wildcard::{is_reserved, Wildcard};
use crate::wire;

/// One position of the template skeleton
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Segment {
    Literal(char),
    Slot(usize),
}

/// Parsed template, shared read-only by every pattern cut from it
#[derive(Debug, PartialEq, Eq)]
struct Template {
    source: String,
    segments: Vec<Segment>,
    classes: Vec<Wildcard>,
}

impl Template {
    fn parse(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(PatternError::pattern(template, "pattern is empty"));
        }

        let chars: Vec<char> = template.chars().collect();
        let mut segments = Vec::new();
        let mut classes = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '[' => {
                    let close = chars[i + 1..]
                        .iter()
                        .position(|&ch| ch == ']')
                        .map(|offset| i + 1 + offset)
                        .ok_or_else(|| PatternError::pattern(template, "unmatched '['"))?;

                    check_class_syntax(template, &chars[i + 1..close])?;

                    let text: String = chars[i..=close].iter().collect();
                    segments.push(Segment::Slot(classes.len()));
                    classes.push(Wildcard::parse(&text, None)?);
                    i = close + 1;
                }
                ']' => return Err(PatternError::pattern(template, "unmatched ']'")),
                ch => {
                    segments.push(Segment::Literal(ch));
                    i += 1;
                }
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            classes,
        })
    }

    /// Resolve a wildcard key into one wildcard per class slot
    fn parse_wildcard_key(&self, key: &str) -> Result<Vec<Wildcard>> {
        let fail = |reason: String| PatternError::wildcard_key(key, &self.source, reason);

        let chars: Vec<char> = key.chars().collect();
        let mut wildcards = Vec::with_capacity(self.classes.len());
        let mut pos = 0;

        for segment in &self.segments {
            match *segment {
                Segment::Literal(expected) => {
                    if chars.get(pos) != Some(&expected) {
                        return Err(fail(format!(
                            "expected literal '{expected}' at position {pos}"
                        )));
                    }
                    pos += 1;
                }
                Segment::Slot(slot) => {
                    let class = &self.classes[slot];
                    match chars.get(pos) {
                        None => return Err(fail("key ends before the pattern".to_string())),
                        Some('*') => {
                            wildcards.push(class.clone());
                            pos += 1;
                        }
                        Some('[') => {
                            let close = chars[pos + 1..]
                                .iter()
                                .position(|&ch| ch == ']')
                                .map(|offset| pos + 1 + offset)
                                .ok_or_else(|| fail("unmatched '['".to_string()))?;
                            let text: String = chars[pos..=close].iter().collect();
                            let wildcard = Wildcard::parse(&text, Some(class))
                                .map_err(|err| fail(err.to_string()))?;
                            debug_assert!(class.contains(&wildcard));
                            wildcards.push(wildcard);
                            pos = close + 1;
                        }
                        Some(&ch) => {
                            if class.position(ch).is_none() {
                                return Err(fail(format!(
                                    "'{ch}' is not in {}",
                                    class.representation()
                                )));
                            }
                            wildcards.push(Wildcard::from_chars(vec![ch]));
                            pos += 1;
                        }
                    }
                }
            }
        }

        if pos != chars.len() {
            return Err(fail("trailing characters after the pattern".to_string()));
        }

        Ok(wildcards)
    }
}

/// Syntax check of a class body; inverted ranges are left to `Wildcard::parse`
fn check_class_syntax(template: &str, body: &[char]) -> Result<()> {
    if body.is_empty() {
        return Err(PatternError::pattern(template, "empty character class"));
    }

    let mut i = 0;
    while i < body.len() {
        if is_reserved(body[i]) {
            return Err(PatternError::pattern(
                template,
                format!("reserved character '{}' in character class", body[i]),
            ));
        }
        if body.get(i + 1) == Some(&'-') {
            match body.get(i + 2) {
                Some(&end) if !is_reserved(end) => i += 3,
                Some(&end) => {
                    return Err(PatternError::pattern(
                        template,
                        format!("reserved character '{end}' in character class"),
                    ))
                }
                None => return Err(PatternError::pattern(template, "dangling '-'")),
            }
        } else {
            i += 1;
        }
    }

    Ok(())
}

/// A key space: template plus one wildcard per class position
///
/// Patterns are owned values. Clones are deep for cursor state and share only
/// the immutable parsed template, so a clone can be handed to another worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPattern {
    template: Arc<Template>,
    wildcards: Vec<Wildcard>,
}

impl KeyPattern {
    /// Parse a template; the new pattern covers its full key space
    ///
    /// # Example
    ///
    /// ```
    /// use keyspace_pool::KeyPattern;
    /// use num_bigint::BigUint;
    ///
    /// let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
    /// assert_eq!(pattern.size(), BigUint::from(6u32));
    /// assert_eq!(pattern.current_key(), "KA0");
    /// ```
    pub fn new(template: &str) -> Result<Self> {
        let template = Template::parse(template)?;
        let wildcards = template.classes.clone();

        Ok(Self {
            template: Arc::new(template),
            wildcards,
        })
    }

    /// Parse a template and restrict it with a wildcard key
    pub fn with_wildcard_key(template: &str, wildcard_key: &str) -> Result<Self> {
        let mut pattern = Self::new(template)?;
        pattern.set_wildcard_key(wildcard_key)?;
        Ok(pattern)
    }

    /// Sibling pattern over the same template with different wildcards
    pub(crate) fn with_wildcards(&self, wildcards: Vec<Wildcard>) -> Self {
        debug_assert_eq!(wildcards.len(), self.wildcards.len());
        Self {
            template: Arc::clone(&self.template),
            wildcards,
        }
    }

    /// The template string this pattern was built from
    pub fn template(&self) -> &str {
        &self.template.source
    }

    /// Current wildcards, left to right
    pub fn wildcards(&self) -> &[Wildcard] {
        &self.wildcards
    }

    /// True iff both patterns are cut from the same template
    pub fn same_space(&self, other: &KeyPattern) -> bool {
        self.template.segments == other.template.segments
            && self.template.classes.len() == other.template.classes.len()
    }

    fn lengths(&self) -> Vec<usize> {
        self.wildcards.iter().map(Wildcard::len).collect()
    }

    fn cursors(&self) -> Vec<usize> {
        self.wildcards.iter().map(Wildcard::count).collect()
    }

    /// Number of keys matching this pattern
    pub fn size(&self) -> BigUint {
        calculate_keyspace(&self.lengths())
    }

    /// Number of keys not yet visited, counting the current one
    pub fn remaining(&self) -> BigUint {
        self.size() - digits_to_index(&self.cursors(), &self.lengths())
    }

    fn render(&self, pick: impl Fn(usize) -> char) -> String {
        self.template
            .segments
            .iter()
            .map(|segment| match *segment {
                Segment::Literal(ch) => ch,
                Segment::Slot(slot) => pick(slot),
            })
            .collect()
    }

    /// Key under the cursor
    pub fn current_key(&self) -> String {
        self.render(|slot| self.wildcards[slot].current())
    }

    /// Key `offset` positions ahead of the cursor, without moving it
    ///
    /// Returns `None` if that would run past the last key.
    pub fn key_at<N: Into<BigUint>>(&self, offset: N) -> Option<String> {
        let lengths = self.lengths();
        let target = digits_to_index(&self.cursors(), &lengths) + offset.into();
        let digits = index_to_digits(&target, &lengths)?;
        let chars = self
            .wildcards
            .iter()
            .zip(&digits)
            .map(|(wildcard, &digit)| wildcard.char_at(digit))
            .collect::<Option<Vec<char>>>()?;

        Some(self.render(|slot| chars[slot]))
    }

    /// Move to the next key; `false` once the whole pattern has wrapped
    pub fn next(&mut self) -> bool {
        match self.wildcards.len() {
            0 => false,
            n => self.next_from(n - 1),
        }
    }

    /// Increment the wildcard at `index`, carrying leftward
    ///
    /// Wildcards right of `index` keep their cursors. Returns `false` when the
    /// carry ran off the leftmost wildcard or `index` is out of range.
    pub fn next_from(&mut self, index: usize) -> bool {
        if index >= self.wildcards.len() {
            return false;
        }

        let mut pos = index;
        loop {
            if !self.wildcards[pos].succ() {
                return true;
            }
            if pos == 0 {
                return false;
            }
            pos -= 1;
        }
    }

    /// Move `n` keys ahead; `false` if that overflows past the last key
    pub fn advance(&mut self, n: &BigUint) -> bool {
        let mut carry = n.clone();
        for wildcard in self.wildcards.iter_mut().rev() {
            if carry.is_zero() {
                break;
            }
            carry = wildcard.add(&carry);
        }
        carry.is_zero()
    }

    /// Rewind every wildcard to its first character
    pub fn rewind(&mut self) {
        self.wildcards.iter_mut().for_each(Wildcard::reset);
    }

    /// Bisect the unvisited keys into two disjoint patterns
    ///
    /// The first wildcard with more than one unvisited character is split.
    /// Wildcards before it are pinned to their current character; wildcards
    /// after it keep their cursors in the first half and restart in the
    /// second. The first half therefore resumes at the current key.
    ///
    /// Returns `None` when at most one key is left.
    pub fn split(&self) -> Option<(KeyPattern, KeyPattern)> {
        let pivot = self.wildcards.iter().position(|wc| wc.remaining() > 1)?;
        let (low, high) = self.wildcards[pivot].split()?;

        let mut first = Vec::with_capacity(self.wildcards.len());
        let mut second = Vec::with_capacity(self.wildcards.len());

        for (i, wildcard) in self.wildcards.iter().enumerate() {
            if i < pivot {
                first.push(wildcard.pinned());
                second.push(wildcard.pinned());
            } else if i == pivot {
                first.push(low.clone());
                second.push(high.clone());
            } else {
                first.push(wildcard.clone());
                let mut restarted = wildcard.clone();
                restarted.reset();
                second.push(restarted);
            }
        }

        debug!(
            "Split '{}' at wildcard {} into {} + {} characters",
            self.wildcard_key(),
            pivot,
            low.len(),
            high.len()
        );

        Some((self.with_wildcards(first), self.with_wildcards(second)))
    }

    /// Compact textual form of the current wildcards
    pub fn wildcard_key(&self) -> String {
        self.render_key(|slot| {
            let wildcard = &self.wildcards[slot];
            if wildcard.chars() == self.template.classes[slot].chars() {
                "*".to_string()
            } else if wildcard.len() == 1 {
                wildcard.chars()[0].to_string()
            } else {
                wildcard.representation()
            }
        })
    }

    fn render_key(&self, slot_text: impl Fn(usize) -> String) -> String {
        let mut out = String::with_capacity(self.template.source.len());
        for segment in &self.template.segments {
            match *segment {
                Segment::Literal(ch) => out.push(ch),
                Segment::Slot(slot) => out.push_str(&slot_text(slot)),
            }
        }
        out
    }

    /// Replace all wildcards with those described by `wildcard_key`
    ///
    /// Cursors restart at the first key of the restricted space. On error the
    /// pattern is left unchanged.
    pub fn set_wildcard_key(&mut self, wildcard_key: &str) -> Result<()> {
        self.wildcards = self.template.parse_wildcard_key(wildcard_key)?;
        Ok(())
    }

    /// Check a wildcard key against the template without applying it
    pub fn test_wildcard_key(&self, wildcard_key: &str) -> bool {
        self.template.parse_wildcard_key(wildcard_key).is_ok()
    }

    /// Template with every class replaced by `*`
    pub fn input_pattern(&self) -> String {
        self.render_key(|_| "*".to_string())
    }

    /// Cursor of every wildcard that has more than one character
    pub fn wildcard_progress(&self) -> Vec<usize> {
        self.wildcards
            .iter()
            .filter(|wc| wc.len() > 1)
            .map(Wildcard::count)
            .collect()
    }

    /// Movement of every wildcard with more than one character, relative to
    /// the unsplit template class at the same position
    pub fn key_movements(&self) -> Vec<KeyMovement> {
        self.wildcards
            .iter()
            .zip(&self.template.classes)
            .filter(|(wildcard, _)| wildcard.len() > 1)
            .map(|(wildcard, class)| KeyMovement::detect(wildcard, class))
            .collect()
    }

    /// Index of the current key inside the full template key space
    pub fn global_index(&self) -> BigUint {
        let mut movements = self.key_movements().into_iter();
        let digits: Vec<usize> = self
            .wildcards
            .iter()
            .zip(&self.template.classes)
            .map(|(wildcard, class)| {
                let local = if wildcard.len() > 1 {
                    movements
                        .next()
                        .and_then(|movement| movement.index_of(wildcard.count()))
                } else {
                    class.position(wildcard.current())
                };
                // Wildcards are always subsets of their class
                local.unwrap_or_default()
            })
            .collect();
        let radices: Vec<usize> = self.template.classes.iter().map(Wildcard::len).collect();

        digits_to_index(&digits, &radices)
    }

    /// Encode for shipping to another worker (see [`crate::wire`])
    pub fn serialize(&self) -> Result<Vec<u8>> {
        wire::serialize(self)
    }

    /// Decode a pattern produced by [`KeyPattern::serialize`]
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        wire::deserialize(bytes)
    }

    /// Iterate from the current key to the last one, consuming the pattern
    pub fn into_keys(self) -> Keys {
        Keys {
            pattern: self,
            done: false,
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wildcard key '{}', pattern '{}'",
            self.wildcard_key(),
            self.template()
        )
    }
}

/// Iterator over the unvisited keys of a pattern
pub struct Keys {
    pattern: KeyPattern,
    done: bool,
}

impl Iterator for Keys {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let key = self.pattern.current_key();
        self.done = !self.pattern.next();
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_parse_template() {
        let pattern = KeyPattern::new("AB[C-F]D[0-9]").unwrap();
        assert_eq!(pattern.wildcards().len(), 2);
        assert_eq!(pattern.size(), big(40));
        assert_eq!(pattern.current_key(), "ABCD0");
        assert_eq!(pattern.input_pattern(), "AB*D*");
    }

    #[test]
    fn test_literal_only_template() {
        let mut pattern = KeyPattern::new("SECRET").unwrap();
        assert_eq!(pattern.size(), big(1));
        assert_eq!(pattern.current_key(), "SECRET");
        assert!(!pattern.next());
        assert!(pattern.split().is_none());
    }

    #[test]
    fn test_invalid_templates() {
        for template in ["", "   ", "[A-C", "A]", "[]", "[A-]", "[*]", "[A[B]", "[-]"] {
            let err = KeyPattern::new(template).unwrap_err();
            assert!(
                matches!(err, PatternError::InvalidPattern { .. }),
                "{template:?} should be an invalid pattern, got {err:?}"
            );
        }
    }

    #[test]
    fn test_inverted_range_is_invalid_wildcard() {
        let err = KeyPattern::new("[Z-A]").unwrap_err();
        assert!(matches!(err, PatternError::InvalidWildcard { .. }));
    }

    #[test]
    fn test_odometer_order() {
        let mut pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        let mut keys = vec![pattern.current_key()];
        while pattern.next() {
            keys.push(pattern.current_key());
        }
        assert_eq!(keys, ["KA0", "KA1", "KB0", "KB1", "KC0", "KC1"]);
        // Wrapped back to the start
        assert_eq!(pattern.current_key(), "KA0");
    }

    #[test]
    fn test_key_at() {
        let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        assert_eq!(pattern.key_at(0u32).as_deref(), Some("KA0"));
        assert_eq!(pattern.key_at(4u32).as_deref(), Some("KC0"));
        assert_eq!(pattern.key_at(5u32).as_deref(), Some("KC1"));
        assert_eq!(pattern.key_at(6u32), None);

        let mut moved = pattern.clone();
        moved.next();
        moved.next();
        assert_eq!(moved.key_at(1u32).as_deref(), Some("KB1"));
        assert_eq!(moved.current_key(), "KB0");
    }

    #[test]
    fn test_next_from() {
        let mut pattern = KeyPattern::new("[a-b][0-2]").unwrap();
        pattern.next();
        assert!(pattern.next_from(0));
        assert_eq!(pattern.current_key(), "b1");
        assert!(!pattern.next_from(0));
        assert!(!pattern.next_from(7));
    }

    #[test]
    fn test_advance() {
        let mut pattern = KeyPattern::new("[a-c][0-3]").unwrap();
        assert!(pattern.advance(&big(5)));
        assert_eq!(pattern.current_key(), "b1");
        assert_eq!(pattern.remaining(), big(7));

        assert!(pattern.advance(&big(6)));
        assert_eq!(pattern.current_key(), "c3");
        assert!(!pattern.advance(&big(1)));
    }

    #[test]
    fn test_split_fresh() {
        let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        let (a, b) = pattern.split().unwrap();
        assert_eq!(a.size() + b.size(), pattern.size());
        assert_eq!(a.wildcard_key(), "KA*");
        assert_eq!(b.wildcard_key(), "K[B-C]*");

        let keys: Vec<String> = a.into_keys().chain(b.into_keys()).collect();
        assert_eq!(keys, ["KA0", "KA1", "KB0", "KB1", "KC0", "KC1"]);
    }

    #[test]
    fn test_split_in_progress() {
        let mut pattern = KeyPattern::new("[a-b][0-3][x-y]").unwrap();
        // a0x a0y a1x ... advance to b1y
        pattern.advance(&big(11));
        assert_eq!(pattern.current_key(), "b1y");

        let (a, b) = pattern.split().unwrap();
        assert_eq!(a.remaining() + b.remaining(), pattern.remaining());
        assert_eq!(a.current_key(), "b1y");
        assert_eq!(b.current_key(), "b2x");

        let keys: Vec<String> = a.into_keys().chain(b.into_keys()).collect();
        let expected: Vec<String> = pattern.into_keys().collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_split_exhausted() {
        let mut pattern = KeyPattern::new("[a-b][0-1]").unwrap();
        pattern.advance(&big(3));
        assert!(pattern.split().is_none());
    }

    #[test]
    fn test_wildcard_key_round_trip() {
        let mut pattern = KeyPattern::new("AB[C-F]D[0-9]").unwrap();
        assert_eq!(pattern.wildcard_key(), "AB*D*");

        pattern.set_wildcard_key("ABED[0-35]").unwrap();
        assert_eq!(pattern.size(), big(5));
        assert_eq!(pattern.wildcard_key(), "ABED[0-35]");
        assert_eq!(pattern.current_key(), "ABED0");
    }

    #[test]
    fn test_invalid_wildcard_keys() {
        let mut pattern = KeyPattern::new("[A-C]").unwrap();
        let err = pattern.set_wildcard_key("[D]").unwrap_err();
        assert!(matches!(err, PatternError::InvalidWildcardKey { .. }));

        for key in ["D", "", "**", "[A-", "x", "[C-A]"] {
            assert!(!pattern.test_wildcard_key(key), "{key:?} should be rejected");
        }

        let literal = KeyPattern::new("K[0-9]").unwrap();
        assert!(!literal.test_wildcard_key("X*"));
        assert!(literal.test_wildcard_key("K7"));
        assert_eq!(pattern.size(), big(3));
    }

    #[test]
    fn test_wildcard_progress() {
        let mut pattern = KeyPattern::with_wildcard_key("[a-c]-[0-9]", "b-*").unwrap();
        pattern.advance(&big(4));
        assert_eq!(pattern.wildcard_progress(), vec![4]);
    }

    #[test]
    fn test_global_index() {
        let full = KeyPattern::new("[a-d][0-4]").unwrap();
        let mut sub = KeyPattern::with_wildcard_key("[a-d][0-4]", "[bd][1-2]").unwrap();
        // b1
        assert_eq!(sub.global_index(), big(6));
        sub.advance(&big(3));
        // d2
        assert_eq!(sub.current_key(), "d2");
        assert_eq!(sub.global_index(), big(17));
        assert_eq!(full.key_at(17u32).as_deref(), Some("d2"));
    }

    #[test]
    fn test_same_space() {
        let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        let (_, upper) = pattern.split().unwrap();
        assert!(pattern.same_space(&pattern.clone()));
        assert!(pattern.same_space(&upper));
        assert!(upper.same_space(&pattern));

        // Same classes, different literal skeleton
        let other = KeyPattern::new("X[A-C][0-1]").unwrap();
        assert!(!pattern.same_space(&other));
        // Same skeleton prefix, one wildcard more
        let longer = KeyPattern::new("K[A-C][0-1][0-1]").unwrap();
        assert!(!pattern.same_space(&longer));
    }

    #[test]
    fn test_display() {
        let pattern = KeyPattern::with_wildcard_key("K[A-C]", "K[A-B]").unwrap();
        assert_eq!(pattern.to_string(), "wildcard key 'K[A-B]', pattern 'K[A-C]'");
    }
}
