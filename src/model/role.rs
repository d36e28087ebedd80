//! Attachment roles.
//!
//! The set of roles is closed. Each role resolves statically to the document
//! fields it fills, so no field name is ever derived from a role string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a related entity on a film work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Director,
    Actor,
    Writer,
    Genre,
}

/// How a role accumulates into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Single structured list, e.g. genres.
    Tag,
    /// Structured `{id, name}` list plus a denormalized name list.
    Credit,
}

impl Role {
    /// Get the string representation stored in the bridge relation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Actor => "actor",
            Self::Writer => "writer",
            Self::Genre => "genre",
        }
    }

    /// Parse a bridge role value; `None` for roles outside the known set.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "director" => Some(Self::Director),
            "actor" => Some(Self::Actor),
            "writer" => Some(Self::Writer),
            "genre" => Some(Self::Genre),
            _ => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RelationKind {
        match self {
            Self::Genre => RelationKind::Tag,
            Self::Director | Self::Actor | Self::Writer => RelationKind::Credit,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
