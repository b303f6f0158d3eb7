//! Key movement descriptors
//!
//! A sub-pattern's wildcard holds a subset of its template class. A movement
//! records where the k-th character of the subset sits in the full class,
//! so a worker can turn its local loop counter into a global key index
//! without searching the class.

use serde::Serialize;

use crate::wildcard::Wildcard;

/// Mapping of a sub-alphabet onto its reference alphabet
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeyMovement {
    /// The k-th element sits at `offset + k * stride`
    Linear {
        stride: usize,
        offset: usize,
        count: usize,
    },
    /// Explicit reference index of every element
    Listed { indices: Vec<usize> },
}

impl KeyMovement {
    /// Compare `wildcard` against `reference` and pick the cheapest descriptor
    ///
    /// `wildcard` must be a subset of `reference`; patterns never produce
    /// anything else.
    pub fn detect(wildcard: &Wildcard, reference: &Wildcard) -> Self {
        let indices: Vec<usize> = wildcard
            .chars()
            .iter()
            .filter_map(|&ch| reference.position(ch))
            .collect();
        debug_assert_eq!(
            indices.len(),
            wildcard.len(),
            "wildcard {wildcard} is not a subset of {reference}"
        );
        Self::from_indices(indices)
    }

    /// Build from reference indices, preferring the linear form
    pub fn from_indices(indices: Vec<usize>) -> Self {
        if indices.len() == 1 {
            return Self::Linear {
                stride: 1,
                offset: indices[0],
                count: 1,
            };
        }

        // Two-point slope, then verify every element
        if indices.len() >= 2 && indices[1] > indices[0] {
            let offset = indices[0];
            let stride = indices[1] - offset;
            let linear = indices
                .iter()
                .enumerate()
                .all(|(k, &idx)| idx == offset + k * stride);
            if linear {
                return Self::Linear {
                    stride,
                    offset,
                    count: indices.len(),
                };
            }
        }

        Self::Listed { indices }
    }

    /// Number of elements described
    pub fn len(&self) -> usize {
        match self {
            Self::Linear { count, .. } => *count,
            Self::Listed { indices } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reference index of the k-th element
    pub fn index_of(&self, k: usize) -> Option<usize> {
        match self {
            Self::Linear {
                stride,
                offset,
                count,
            } => (k < *count).then(|| offset + k * stride),
            Self::Listed { indices } => indices.get(k).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc(expr: &str) -> Wildcard {
        Wildcard::parse(expr, None).unwrap()
    }

    #[test]
    fn test_contiguous_slice_is_linear() {
        let full = wc("[0-9]");
        let movement = KeyMovement::detect(&wc("[3-6]"), &full);
        assert_eq!(
            movement,
            KeyMovement::Linear {
                stride: 1,
                offset: 3,
                count: 4
            }
        );
        assert_eq!(movement.index_of(2), Some(5));
        assert_eq!(movement.index_of(4), None);
    }

    #[test]
    fn test_strided_subset_is_linear() {
        let full = wc("[a-j]");
        let movement = KeyMovement::detect(&wc("[bdfh]"), &full);
        assert_eq!(
            movement,
            KeyMovement::Linear {
                stride: 2,
                offset: 1,
                count: 4
            }
        );
    }

    #[test]
    fn test_irregular_subset_is_listed() {
        let full = wc("[a-j]");
        let movement = KeyMovement::detect(&wc("[abej]"), &full);
        assert_eq!(
            movement,
            KeyMovement::Listed {
                indices: vec![0, 1, 4, 9]
            }
        );
        assert_eq!(movement.len(), 4);
        assert_eq!(movement.index_of(3), Some(9));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not a subset")]
    fn test_detect_requires_subset() {
        KeyMovement::detect(&wc("[a-c]"), &wc("[a-b]"));
    }

    #[test]
    fn test_movement_json() {
        let json = serde_json::to_string(&KeyMovement::from_indices(vec![2, 4])).unwrap();
        assert_eq!(json, r#"{"kind":"linear","stride":2,"offset":2,"count":2}"#);
    }
}
