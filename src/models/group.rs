use crate::models::ComponentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A named, ordered collection of component references.
///
/// Groups carry no persisted status of their own. The displayed status is
/// computed from member components on every read, so it can never drift from
/// component state.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Group {
    /// Unique identifier
    pub id: Uuid,

    /// Human-readable name
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Detailed description
    pub description: String,

    /// Ordered member component ids (membership, not ownership)
    pub components: Vec<Uuid>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Create a new group
    pub fn new(name: String, description: String, components: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            components,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive the group's display status from its member statuses.
    ///
    /// Returns the most severe member status; an empty group is operational.
    pub fn aggregate_status(statuses: &[ComponentStatus]) -> ComponentStatus {
        statuses
            .iter()
            .copied()
            .max_by_key(|status| status.severity())
            .unwrap_or(ComponentStatus::Operational)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_is_operational() {
        assert_eq!(
            Group::aggregate_status(&[]),
            ComponentStatus::Operational
        );
    }

    #[test]
    fn test_maintenance_beats_operational() {
        let statuses = [
            ComponentStatus::Operational,
            ComponentStatus::UnderMaintenance,
        ];
        assert_eq!(
            Group::aggregate_status(&statuses),
            ComponentStatus::UnderMaintenance
        );
    }

    #[test]
    fn test_most_severe_member_wins() {
        let statuses = [
            ComponentStatus::Degraded,
            ComponentStatus::Major,
            ComponentStatus::Operational,
            ComponentStatus::Partial,
        ];
        assert_eq!(Group::aggregate_status(&statuses), ComponentStatus::Major);
    }

    #[test]
    fn test_identical_members_report_shared_status() {
        let statuses = [ComponentStatus::Major, ComponentStatus::Major];
        assert_eq!(Group::aggregate_status(&statuses), ComponentStatus::Major);
    }
}
