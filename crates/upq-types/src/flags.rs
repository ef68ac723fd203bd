//! Per-plot update flags
//!
//! A flag record tells the consumer how to regenerate a plot. It is stored as
//! a space-joined list of short tokens, always written in declaration order:
//!
//! | Flag            | Token | Legacy aliases |
//! |-----------------|-------|----------------|
//! | `MetadataOnly`  | `mfo` | `mo`           |
//! | `DefaultJson`   | `sdj` | `sdp`          |
//! | `DefaultBuild`  | `sdb` |                |
//! | `NoImageUpdate` | `niu` |                |
//!
//! `sdp` was written by older producers for the "default plot" flag, which
//! occupies the same slot as `DefaultJson`. It is accepted on input and never
//! emitted.

use crate::error::FlagParseError;
use bitflags::bitflags;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Token for [`UpdateFlag::MetadataOnly`]
pub const TOKEN_METADATA_ONLY: &str = "mfo";
/// Token for [`UpdateFlag::DefaultJson`]
pub const TOKEN_DEFAULT_JSON: &str = "sdj";
/// Token for [`UpdateFlag::DefaultBuild`]
pub const TOKEN_DEFAULT_BUILD: &str = "sdb";
/// Token for [`UpdateFlag::NoImageUpdate`]
pub const TOKEN_NO_IMAGE_UPDATE: &str = "niu";
/// Legacy "default plot" token, parsed as [`UpdateFlag::DefaultJson`]
pub const LEGACY_TOKEN_DEFAULT_PLOT: &str = "sdp";
/// Legacy short metadata-only token, parsed as [`UpdateFlag::MetadataOnly`]
pub const LEGACY_TOKEN_METADATA_ONLY: &str = "mo";

/// A single optional update behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateFlag {
    /// Only refresh metadata fields, keep plot payload
    MetadataOnly,
    /// Reset the plot's JSON part to the default
    DefaultJson,
    /// Reset the plot's build data to the default
    DefaultBuild,
    /// Skip image regeneration
    NoImageUpdate,
}

impl UpdateFlag {
    /// Every flag, in serialization order
    pub const ALL: [Self; 4] = [
        Self::MetadataOnly,
        Self::DefaultJson,
        Self::DefaultBuild,
        Self::NoImageUpdate,
    ];

    /// Older name for the default-json slot
    pub const DEFAULT_PLOT: Self = Self::DefaultJson;

    /// Canonical token
    #[inline]
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::MetadataOnly => TOKEN_METADATA_ONLY,
            Self::DefaultJson => TOKEN_DEFAULT_JSON,
            Self::DefaultBuild => TOKEN_DEFAULT_BUILD,
            Self::NoImageUpdate => TOKEN_NO_IMAGE_UPDATE,
        }
    }

    /// Map a token (canonical or legacy) to its flag
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            TOKEN_METADATA_ONLY | LEGACY_TOKEN_METADATA_ONLY => Some(Self::MetadataOnly),
            TOKEN_DEFAULT_JSON | LEGACY_TOKEN_DEFAULT_PLOT => Some(Self::DefaultJson),
            TOKEN_DEFAULT_BUILD => Some(Self::DefaultBuild),
            TOKEN_NO_IMAGE_UPDATE => Some(Self::NoImageUpdate),
            _ => None,
        }
    }

    const fn bit(self) -> FlagBits {
        match self {
            Self::MetadataOnly => FlagBits::METADATA_ONLY,
            Self::DefaultJson => FlagBits::DEFAULT_JSON,
            Self::DefaultBuild => FlagBits::DEFAULT_BUILD,
            Self::NoImageUpdate => FlagBits::NO_IMAGE_UPDATE,
        }
    }
}

impl Display for UpdateFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct FlagBits: u8 {
        const METADATA_ONLY = 1 << 0;
        const DEFAULT_JSON = 1 << 1;
        const DEFAULT_BUILD = 1 << 2;
        const NO_IMAGE_UPDATE = 1 << 3;
    }
}

/// Set of [`UpdateFlag`]s attached to one plot
///
/// Value type: equality, hashing and serialization depend only on which
/// flags are present, never on the order they were added in.
///
/// # Example
/// ```
/// use upq_types::{UpdateFlag, UpdateFlagSet};
///
/// let flags = UpdateFlagSet::new()
///     .with(UpdateFlag::NoImageUpdate)
///     .with(UpdateFlag::DefaultBuild);
/// assert_eq!(flags.serialize(), "sdb niu");
/// assert_eq!(UpdateFlagSet::parse("sdb niu").unwrap(), flags);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateFlagSet(FlagBits);

impl UpdateFlagSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(FlagBits::empty())
    }

    /// Copy of this set with `flag` added
    #[inline]
    #[must_use]
    pub fn with(self, flag: UpdateFlag) -> Self {
        Self(self.0 | flag.bit())
    }

    /// Copy of this set with `flag` removed
    #[inline]
    #[must_use]
    pub fn without(self, flag: UpdateFlag) -> Self {
        Self(self.0 - flag.bit())
    }

    /// Whether `flag` is present
    #[inline]
    #[must_use]
    pub fn has(self, flag: UpdateFlag) -> bool {
        self.0.contains(flag.bit())
    }

    /// True when no flag is set
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    /// Number of flags set
    #[inline]
    #[must_use]
    pub fn len(self) -> usize {
        self.0.bits().count_ones() as usize
    }

    /// Present flags in serialization order
    pub fn flags(self) -> impl Iterator<Item = UpdateFlag> {
        UpdateFlag::ALL.into_iter().filter(move |f| self.has(*f))
    }

    /// Canonical token string; empty set gives `""`
    #[must_use]
    pub fn serialize(self) -> String {
        self.flags()
            .map(UpdateFlag::token)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Strict parse of a token string
    ///
    /// Splits on any whitespace; repeated tokens are harmless.
    ///
    /// # Errors
    /// Returns [`FlagParseError::UnknownToken`] on the first token outside the
    /// vocabulary
    pub fn parse(s: &str) -> Result<Self, FlagParseError> {
        s.split_whitespace().try_fold(Self::new(), |set, token| {
            UpdateFlag::from_token(token)
                .map(|flag| set.with(flag))
                .ok_or_else(|| FlagParseError::UnknownToken(token.to_string()))
        })
    }

    /// Tolerant parse: unknown tokens are collected instead of failing
    #[must_use]
    pub fn parse_lossy(s: &str) -> (Self, Vec<String>) {
        let mut unknown = Vec::new();
        let mut set = Self::new();
        for token in s.split_whitespace() {
            match UpdateFlag::from_token(token) {
                Some(flag) => set = set.with(flag),
                None => unknown.push(token.to_string()),
            }
        }
        (set, unknown)
    }
}

impl Default for UpdateFlagSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UpdateFlagSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for UpdateFlagSet {
    type Err = FlagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<UpdateFlag> for UpdateFlagSet {
    fn from(flag: UpdateFlag) -> Self {
        Self::new().with(flag)
    }
}

impl FromIterator<UpdateFlag> for UpdateFlagSet {
    fn from_iter<I: IntoIterator<Item = UpdateFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}
