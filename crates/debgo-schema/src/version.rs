//! Debian version parsing and ordering.
//!
//! Format: `[epoch:]upstream_version[-debian_revision]`. Ordering follows
//! dpkg: epochs compare numerically, then upstream and revision are compared
//! by alternating non-digit and digit runs, where `~` sorts before everything
//! (even the end of the string) and letters sort before other symbols.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a Debian version string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    /// The version string is empty.
    #[error("empty version string")]
    Empty,

    /// The part before the first `:` is not a number.
    #[error("invalid epoch in version '{0}'")]
    InvalidEpoch(String),

    /// Nothing remains between the epoch and the revision.
    #[error("empty upstream version in '{0}'")]
    EmptyUpstream(String),
}

/// A parsed Debian version with epoch, upstream version and revision.
#[derive(Debug, Clone)]
pub struct DebVersion {
    /// Epoch (0 when absent).
    pub epoch: u32,
    /// Upstream version.
    pub upstream: String,
    /// Debian revision (empty for native packages).
    pub revision: String,
}

impl DebVersion {
    /// Parse a Debian version string.
    ///
    /// - `"1.2.3"` → epoch 0, upstream `1.2.3`, no revision
    /// - `"2:1.2.3-4"` → epoch 2, upstream `1.2.3`, revision `4`
    /// - `"1.0-rc1-2"` → upstream `1.0-rc1`, revision `2` (last hyphen splits)
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] for empty input, a non-numeric epoch or an
    /// empty upstream component.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) => {
                let epoch = e
                    .parse::<u32>()
                    .map_err(|_| VersionError::InvalidEpoch(s.to_string()))?;
                (epoch, r)
            }
            None => (0, s),
        };

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((u, r)) => (u, r),
            None => (rest, ""),
        };

        if upstream.is_empty() {
            return Err(VersionError::EmptyUpstream(s.to_string()));
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.to_string(),
        })
    }
}

/// Weight of a single non-digit character in dpkg ordering.
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(c) => i32::from(c) + 256,
    }
}

/// dpkg's `verrevcmp` over a single component (upstream or revision).
fn compare_component(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit prefix, character by character.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = order(a.get(i).copied());
            let bc = order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }

        // Numeric run: longer wins, otherwise the first differing digit.
        let mut first_diff = Ordering::Equal;
        while i < a.len() && a[i].is_ascii_digit() && j < b.len() && b[j].is_ascii_digit() {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if i < a.len() && a[i].is_ascii_digit() {
            return Ordering::Greater;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}

impl Ord for DebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_component(&self.upstream, &other.upstream))
            .then_with(|| compare_component(&self.revision, &other.revision))
    }
}

impl PartialOrd for DebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows ordering: "1.0" and "1.00" are the same version.
impl PartialEq for DebVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DebVersion {}

impl FromStr for DebVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}
