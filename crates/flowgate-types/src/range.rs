use serde::{Deserialize, Serialize};

/// An HTTP-style inclusive byte range, not yet resolved against a size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteRange {
    /// The whole content.
    #[default]
    Unbounded,
    /// `first..=last`, `last` clamped to the content size.
    Bounded { first: u64, last: u64 },
    /// `first..` to the end.
    From { first: u64 },
    /// The final `length` bytes.
    Suffix { length: u64 },
}

/// A resolved `(offset, length)` window inside content of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWindow {
    pub offset: u64,
    pub length: u64,
}

impl ReadWindow {
    /// Inclusive last byte position, or `None` for an empty window.
    pub fn last_byte(&self) -> Option<u64> {
        (self.length > 0).then(|| self.offset + self.length - 1)
    }
}

impl ByteRange {
    pub fn bounded(first: u64, last: u64) -> Self {
        Self::Bounded { first, last }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Well-formed independent of any size: `first <= last`, non-empty suffix.
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Unbounded | Self::From { .. } => true,
            Self::Bounded { first, last } => first <= last,
            Self::Suffix { length } => length > 0,
        }
    }

    /// Resolve against `size`. Returns `None` when the range cannot be satisfied.
    ///
    /// An unbounded range is always satisfiable, including for empty content.
    pub fn compute_bounds(&self, size: u64) -> Option<ReadWindow> {
        if !self.is_valid() {
            return None;
        }
        match *self {
            Self::Unbounded => Some(ReadWindow { offset: 0, length: size }),
            Self::Suffix { length } => {
                let length = length.min(size);
                Some(ReadWindow { offset: size - length, length })
            }
            Self::From { first } => {
                (first < size).then(|| ReadWindow { offset: first, length: size - first })
            }
            Self::Bounded { first, last } => {
                if first >= size {
                    return None;
                }
                let last = last.min(size - 1);
                Some(ReadWindow { offset: first, length: last - first + 1 })
            }
        }
    }

    /// Parse a single-range `Range` header value (`bytes=0-99`, `bytes=100-`, `bytes=-50`).
    ///
    /// Multi-range requests and malformed values yield `None`; callers treat
    /// that as "no range" the way most servers do.
    pub fn parse_header(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());
        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self::Suffix { length: end.parse().ok()? }),
            (false, true) => Some(Self::From { first: start.parse().ok()? }),
            (false, false) => {
                let range = Self::Bounded { first: start.parse().ok()?, last: end.parse().ok()? };
                range.is_valid().then_some(range)
            }
        }
    }
}
