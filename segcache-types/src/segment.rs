//! Segment types and the projection rule.
//!
//! A segment is a named group of an entity's fields that can be subscribed
//! to and updated on its own. The set is closed: adding a segment means
//! adding a variant here and binding a query service for it.

use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The composed entity object.
///
/// Root-level fields (identity, display name, ...) sit at the top level;
/// every non-root segment sits under its [`SegmentType::key`].
pub type EntityData = Map<String, Value>;

/// A named, independently subscribable field group of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// The whole entity. Subscribers see every change.
    User,
    Wishlist,
    Followers,
    Following,
}

impl SegmentType {
    /// The segment denoting the whole entity.
    pub const ROOT: SegmentType = SegmentType::User;

    /// Every segment, root first.
    pub const ALL: [SegmentType; 4] = [
        SegmentType::User,
        SegmentType::Wishlist,
        SegmentType::Followers,
        SegmentType::Following,
    ];

    /// Whether this segment denotes the whole entity.
    #[must_use]
    pub const fn is_root(self) -> bool {
        matches!(self, SegmentType::User)
    }

    /// Stable string key, also used as the field name inside [`EntityData`].
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            SegmentType::User => "user",
            SegmentType::Wishlist => "wishlist",
            SegmentType::Followers => "followers",
            SegmentType::Following => "following",
        }
    }

    /// Projects composed entity data onto this segment.
    ///
    /// The root segment sees the whole object; any other segment sees the
    /// value stored under its key, or `null` when absent.
    #[must_use]
    pub fn project(self, data: &EntityData) -> Value {
        if self.is_root() {
            Value::Object(data.clone())
        } else {
            data.get(self.key()).cloned().unwrap_or(Value::Null)
        }
    }

    /// Whether a listener on `self` is interested in a change to `changed`.
    #[must_use]
    pub fn observes(self, changed: SegmentType) -> bool {
        self == changed || self.is_root()
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SegmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentType::ALL
            .into_iter()
            .find(|segment| segment.key() == s)
            .ok_or_else(|| Error::UnknownSegment(s.to_string()))
    }
}
