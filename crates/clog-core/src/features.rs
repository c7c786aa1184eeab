//! Capability bitmask negotiated between peers.
//!
//! Each bit names a wire-format revision. An encoder emits the newest layout
//! whose bit is present and falls back to the older layout otherwise, so a
//! node can always produce bytes a lower-capability peer understands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// A set of wire-format capabilities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(u64);

impl Features {
    /// No optional capabilities: the oldest layouts.
    pub const NONE: Self = Self(0);

    /// Entries carry the display name up front and a full address vector
    /// (entry struct v5). Without it entries use v4 with one legacy address.
    pub const ENTRY_ADDRVEC: Self = Self(1 << 0);

    /// Summaries carry the global seq and per-channel tails (summary
    /// struct v3). Without it summaries use v2, a flat ordered tail.
    pub const SUMMARY_CHANNELS: Self = Self(1 << 1);

    /// Every capability this build knows about.
    pub const ALL: Self = Self(Self::ENTRY_ADDRVEC.0 | Self::SUMMARY_CHANNELS.0);

    /// Create from raw bits, dropping bits this build does not know.
    pub const fn from_bits_truncate(bits: u64) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Get the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Check whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The capabilities both sides share.
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every subset of [`Features::ALL`], for exhaustive compatibility tests.
    pub fn combinations() -> Vec<Self> {
        (0..=Self::ALL.0)
            .filter(|bits| bits & !Self::ALL.0 == 0)
            .map(Self)
            .collect()
    }
}

impl BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for Features {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl fmt::Debug for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::ENTRY_ADDRVEC) {
            names.push("ENTRY_ADDRVEC");
        }
        if self.contains(Self::SUMMARY_CHANNELS) {
            names.push("SUMMARY_CHANNELS");
        }
        if names.is_empty() {
            names.push("NONE");
        }
        write!(f, "Features({})", names.join(" | "))
    }
}
