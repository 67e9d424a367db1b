// 🧑‍🔬 Operator Entity - the person an action is attributed to
//
// Access levels are role tags only. Nothing in the core enforces them; the
// network-facing layer may consult `has_permission` before routing a call.

use super::{Entity, EntityKind};
use serde::{Deserialize, Serialize};

// ============================================================================
// ACCESS LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Full access to every operation
    Admin,

    /// Measurement, viewing and reporting
    Technician,

    /// Measurement and viewing only
    Operator,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Admin => "ADMIN",
            AccessLevel::Technician => "TECHNICIAN",
            AccessLevel::Operator => "OPERATOR",
        }
    }

    /// Parse a claimed access level tag (case-insensitive, trimmed).
    pub fn parse(tag: &str) -> Option<AccessLevel> {
        match tag.trim().to_uppercase().as_str() {
            "ADMIN" => Some(AccessLevel::Admin),
            "TECHNICIAN" => Some(AccessLevel::Technician),
            "OPERATOR" => Some(AccessLevel::Operator),
            _ => None,
        }
    }

    /// Operations this level is tagged for
    pub fn permissions(&self) -> &'static [Operation] {
        match self {
            AccessLevel::Admin => &[
                Operation::Measure,
                Operation::View,
                Operation::Report,
                Operation::Configure,
            ],
            AccessLevel::Technician => &[Operation::Measure, Operation::View, Operation::Report],
            AccessLevel::Operator => &[Operation::Measure, Operation::View],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AccessLevel::Admin => "Full system access",
            AccessLevel::Technician => "Measurement, viewing and reports",
            AccessLevel::Operator => "Measurement and basic viewing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Measure,
    View,
    Report,
    Configure,
}

// ============================================================================
// OPERATOR ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,

    /// Display name
    pub name: String,

    pub email: String,

    /// Claimed access level tag, stored upper-cased as received.
    /// Validation checks that it is one of the known tags.
    pub access_level: String,
}

impl Operator {
    pub fn new(id: &str, name: &str, email: &str, access_level: &str) -> Self {
        Operator {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            access_level: access_level.trim().to_uppercase(),
        }
    }

    /// Parsed access level, `None` when the claimed tag is unknown
    pub fn level(&self) -> Option<AccessLevel> {
        AccessLevel::parse(&self.access_level)
    }

    pub fn is_admin(&self) -> bool {
        self.level() == Some(AccessLevel::Admin)
    }

    /// Role-tag check. An operator with an unknown tag has no permissions.
    pub fn has_permission(&self, operation: Operation) -> bool {
        self.level()
            .map(|level| level.permissions().contains(&operation))
            .unwrap_or(false)
    }
}

impl Entity for Operator {
    const KIND: EntityKind = EntityKind::Operator;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_creation_normalizes_fields() {
        let op = Operator::new(" OP001 ", "Ana Souza", "ana@lab.org", "technician");

        assert_eq!(op.id, "OP001");
        assert_eq!(op.access_level, "TECHNICIAN");
        assert_eq!(op.level(), Some(AccessLevel::Technician));
        assert!(!op.is_admin());
    }

    #[test]
    fn test_access_level_parse() {
        assert_eq!(AccessLevel::parse("ADMIN"), Some(AccessLevel::Admin));
        assert_eq!(AccessLevel::parse(" operator "), Some(AccessLevel::Operator));
        assert_eq!(AccessLevel::parse("SUPERUSER"), None);
        assert_eq!(AccessLevel::parse(""), None);
    }

    #[test]
    fn test_permissions_by_level() {
        let admin = Operator::new("OP001", "Admin", "admin@lab.org", "ADMIN");
        let tech = Operator::new("OP002", "Tech", "tech@lab.org", "TECHNICIAN");
        let basic = Operator::new("OP003", "Basic", "basic@lab.org", "OPERATOR");
        let unknown = Operator::new("OP004", "Ghost", "ghost@lab.org", "GUEST");

        assert!(admin.has_permission(Operation::Configure));
        assert!(tech.has_permission(Operation::Report));
        assert!(!tech.has_permission(Operation::Configure));
        assert!(basic.has_permission(Operation::Measure));
        assert!(!basic.has_permission(Operation::Report));
        assert!(!unknown.has_permission(Operation::View));
    }
}
