use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of an entity holding flight time (a player UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Fresh random identifier, used by hosts that mint their own player ids.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Remaining flight time of one entity.
///
/// `Unlimited` is an explicit state rather than a reserved counter value, so
/// `Limited(0)` always means "no time left".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "snake_case")]
pub enum Balance {
    Unlimited,
    Limited(u64),
}

impl Balance {
    /// True when the entity has no time left and must not fly.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Balance::Limited(0))
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Balance::Unlimited)
    }

    /// Counter value, or `None` for unlimited entities.
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Balance::Unlimited => None,
            Balance::Limited(secs) => Some(*secs),
        }
    }
}

impl Default for Balance {
    fn default() -> Self {
        Balance::Limited(0)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Unlimited => f.write_str("unlimited"),
            Balance::Limited(secs) => f.write_str(&crate::format::format_duration(*secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_parses_its_display_form() {
        let id = EntityId::new();
        let parsed: EntityId = id.to_string().parse().expect("parse failed");
        assert_eq!(parsed, id);
    }

    #[test]
    fn zero_is_exhausted_but_unlimited_is_not() {
        assert!(Balance::Limited(0).is_exhausted());
        assert!(!Balance::Limited(1).is_exhausted());
        assert!(!Balance::Unlimited.is_exhausted());
        assert_eq!(Balance::Unlimited.seconds(), None);
    }

    #[test]
    fn balance_display() {
        assert_eq!(Balance::Unlimited.to_string(), "unlimited");
        assert_eq!(Balance::Limited(61).to_string(), "0y 0h 1m 1s");
    }
}
