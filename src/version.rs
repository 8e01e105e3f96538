//! Package version parsing and ordering.
//!
//! A version string is split into a *body* and a *release* at its last `-`.
//! The body is split on `.` into segments: an all-digit component becomes a
//! plain number, anything else becomes a tuple of alternating digit and
//! non-digit runs (`"1rc2"` -> `(1, "rc", 2)`).
//!
//! Ordering rules, in precedence order:
//! 1. segments pairwise, up to the shorter segment count
//!    - number vs number: numeric
//!    - tuple vs tuple: element-wise up to the shorter tuple, then the
//!      shorter tuple is lesser
//!    - tuple vs number: the tuple is always greater
//! 2. fewer segments is lesser
//! 3. release: numeric when both are numbers, otherwise as strings
//!
//! Whenever a number meets a string the two are compared by their string
//! forms. Numbers are kept as normalized digit strings so arbitrarily long
//! digit runs order exactly.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One scalar inside a segment or the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    /// Decimal number, stored without leading zeros ("0" for zero)
    Num(String),
    Text(String),
}

impl Scalar {
    fn number(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            Scalar::Num("0".to_string())
        } else {
            Scalar::Num(trimmed.to_string())
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Scalar::Num(s) | Scalar::Text(s) => s,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Normalized digit strings: longer is bigger, equal length is lexical.
            (Scalar::Num(a), Scalar::Num(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            _ => self.as_str().cmp(other.as_str()),
        }
    }
}

/// One dot-separated component of the version body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(Scalar),
    Runs(Vec<Scalar>),
}

impl Segment {
    fn parse(component: &str) -> Self {
        if !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit()) {
            return Segment::Plain(Scalar::number(component));
        }

        let mut runs = Vec::new();
        let mut current = String::new();
        let mut in_digits = false;
        for c in component.chars() {
            let digit = c.is_ascii_digit();
            if !current.is_empty() && digit != in_digits {
                runs.push(flush(&current, in_digits));
                current.clear();
            }
            in_digits = digit;
            current.push(c);
        }
        if !current.is_empty() {
            runs.push(flush(&current, in_digits));
        }
        Segment::Runs(runs)
    }
}

fn flush(run: &str, digits: bool) -> Scalar {
    if digits {
        Scalar::number(run)
    } else {
        Scalar::Text(run.to_string())
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Plain(a), Segment::Plain(b)) => a.cmp(b),
            (Segment::Runs(a), Segment::Runs(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.cmp(y))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Segment::Runs(_), Segment::Plain(_)) => Ordering::Greater,
            (Segment::Plain(_), Segment::Runs(_)) => Ordering::Less,
        }
    }
}

/// Immutable parsed form of a version string.
///
/// Equality follows the ordering, so `"1.01"` equals `"1.1"`.
#[derive(Debug, Clone)]
pub struct ParsedVersion {
    raw: String,
    segments: Vec<Segment>,
    release: Scalar,
}

impl ParsedVersion {
    /// Parse a version string. Parsing never fails: every string has a place
    /// in the order.
    pub fn parse(s: &str) -> Self {
        let (body, release) = match s.rfind('-') {
            Some(idx) if idx + 1 < s.len() => {
                let suffix = &s[idx + 1..];
                let release = if suffix.bytes().all(|b| b.is_ascii_digit()) {
                    Scalar::number(suffix)
                } else {
                    Scalar::Text(suffix.to_string())
                };
                (&s[..idx], release)
            }
            // A trailing '-' carries no release.
            Some(idx) => (&s[..idx], Scalar::number("0")),
            None => (s, Scalar::number("0")),
        };

        ParsedVersion {
            raw: s.to_string(),
            segments: body.split('.').map(Segment::parse).collect(),
            release,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn release(&self) -> &Scalar {
        &self.release
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for ParsedVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ParsedVersion::parse(s))
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for ParsedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for ParsedVersion {}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .map(|(a, b)| a.cmp(b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| self.segments.len().cmp(&other.segments.len()))
            .then_with(|| self.release.cmp(&other.release))
    }
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    ParsedVersion::parse(a).cmp(&ParsedVersion::parse(b))
}
