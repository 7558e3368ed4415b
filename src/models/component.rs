use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// A monitored system part with a single authoritative health status.
///
/// Status is mutated either directly by an admin action or as a side effect
/// of the incident engine; `version` increases by one on every status write,
/// whichever path performed it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Component {
    /// Unique identifier
    pub id: Uuid,

    /// Human-readable name
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Detailed description
    pub description: String,

    /// Current health status
    pub status: ComponentStatus,

    /// Monotonic counter bumped on every status write
    pub version: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Component {
    /// Create a new component, operational by default
    pub fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            status: ComponentStatus::Operational,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new component with an explicit initial status
    pub fn with_status(name: String, description: String, status: ComponentStatus) -> Self {
        let mut component = Self::new(name, description);
        component.status = status;
        component
    }
}

/// Component health status, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComponentStatus {
    Operational,
    UnderMaintenance,
    Degraded,
    Partial,
    Major,
}

impl ComponentStatus {
    /// Numeric severity (higher is worse)
    pub fn severity(&self) -> u8 {
        match self {
            ComponentStatus::Operational => 0,
            ComponentStatus::UnderMaintenance => 1,
            ComponentStatus::Degraded => 2,
            ComponentStatus::Partial => 3,
            ComponentStatus::Major => 4,
        }
    }

    /// Check whether the component is healthy
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Operational)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_component_is_operational() {
        let component = Component::new("API".to_string(), "Public API".to_string());
        assert_eq!(component.status, ComponentStatus::Operational);
        assert_eq!(component.version, 0);
    }

    #[test]
    fn test_severity_order() {
        assert!(ComponentStatus::Operational.severity() < ComponentStatus::UnderMaintenance.severity());
        assert!(ComponentStatus::UnderMaintenance.severity() < ComponentStatus::Degraded.severity());
        assert!(ComponentStatus::Degraded.severity() < ComponentStatus::Partial.severity());
        assert!(ComponentStatus::Partial.severity() < ComponentStatus::Major.severity());
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(ComponentStatus::UnderMaintenance.to_string(), "under_maintenance");
        assert_eq!(
            "degraded".parse::<ComponentStatus>().unwrap(),
            ComponentStatus::Degraded
        );
    }
}
