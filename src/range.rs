//! Range-based pagination model.
//!
//! Collections paginate with the HTTP `Range`/`Content-Range` header pair
//! using a custom range unit counting whole elements (default
//! `"elements"`) instead of bytes. Bounds are inclusive indices:
//! `elements=1-3` asks for elements 1 through 3, `elements=5-` for
//! everything from index 5 on, `elements=-2` for the last two elements.

/// A requested element range. At least one bound must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRange {
    /// First element index (inclusive). `None` makes this a tail request.
    pub from: Option<u64>,
    /// Last element index (inclusive), or for a tail request the number of
    /// trailing elements. `None` leaves the range open-ended.
    pub to: Option<u64>,
}

impl ElementRange {
    /// Everything from `from` (inclusive) to the end of the collection.
    pub fn open(from: u64) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// The last `count` elements of the collection.
    pub fn tail(count: u64) -> Self {
        Self {
            from: None,
            to: Some(count),
        }
    }

    /// The closed interval `from..=to`.
    pub fn closed(from: u64, to: u64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Render the `Range` request header value for the given unit.
    pub(crate) fn to_header(self, unit: &str) -> String {
        match (self.from, self.to) {
            (Some(from), Some(to)) => format!("{unit}={from}-{to}"),
            (Some(from), None) => format!("{unit}={from}-"),
            (None, Some(count)) => format!("{unit}=-{count}"),
            // Unbounded on both sides degenerates to "from the start".
            (None, None) => format!("{unit}=0-"),
        }
    }
}

/// The range a server reports having served, from a `Content-Range`
/// response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First served element index (inclusive).
    pub from: u64,
    /// Last served element index (inclusive); `None` when the server left
    /// the upper bound open.
    pub to: Option<u64>,
    /// Total collection length, when the server knows it.
    pub length: Option<u64>,
}

impl ContentRange {
    /// Parse a `Content-Range` value such as `elements 0-1/3`,
    /// `elements 2-2` or `elements 0-/*`. Returns `None` when the value
    /// does not use the expected unit or does not parse.
    pub(crate) fn parse(value: &str, unit: &str) -> Option<Self> {
        let rest = value.strip_prefix(unit)?.strip_prefix(' ')?;
        let (range, length) = match rest.split_once('/') {
            Some((range, "*")) => (range, None),
            Some((range, length)) => (range, Some(length.trim().parse().ok()?)),
            None => (rest, None),
        };
        let (from, to) = range.split_once('-')?;
        Some(Self {
            from: from.trim().parse().ok()?,
            to: to.trim().parse().ok(),
            length,
        })
    }
}

/// The result of a ranged read: the served elements plus the range the
/// server reported, absent when the server ignored range semantics.
#[derive(Debug, Clone)]
pub struct PartialResponse<T> {
    /// Served elements, in collection order.
    pub elements: Vec<T>,
    /// The server-reported content range, if any.
    pub range: Option<ContentRange>,
}
