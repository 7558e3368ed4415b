use crate::models::ComponentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// A tracked issue with a status/impact and a set of affected components.
///
/// The incident row is a materialized view: its status, impact and affected
/// component set must always equal the fold of the incident's update log in
/// creation order. The engine is the only writer, and it never writes the row
/// without appending the matching log entry in the same atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Incident {
    /// Unique identifier
    pub id: Uuid,

    /// Human-readable title
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    /// Detailed description
    #[validate(length(min = 1))]
    pub description: String,

    /// Current lifecycle status
    pub status: IncidentStatus,

    /// Impact level
    pub impact: IncidentImpact,

    /// Components this incident has touched, each with the status it was
    /// set to as part of this incident (a snapshot, not a live join)
    pub affected_components: Vec<AffectedComponent>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Create a new incident
    pub fn new(
        title: String,
        description: String,
        status: IncidentStatus,
        impact: IncidentImpact,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            status,
            impact,
            affected_components: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the incident is still open
    pub fn is_active(&self) -> bool {
        !matches!(self.status, IncidentStatus::Resolved)
    }

    /// Snapshot entry for a component, if this incident has touched it
    pub fn affected(&self, component_id: &Uuid) -> Option<&AffectedComponent> {
        self.affected_components
            .iter()
            .find(|entry| entry.component_id == *component_id)
    }
}

/// Incident lifecycle status.
///
/// The conventional progression is investigating -> identified -> monitoring
/// -> resolved, but ordering is not enforced: any status may be set from any
/// other, and a resolved incident may be reopened by a later update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

/// Incident impact level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentImpact {
    None,
    Minor,
    Major,
    Critical,
}

/// A component reference held by an incident, annotated with the status the
/// component was set to as part of this incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedComponent {
    pub component_id: Uuid,
    pub name: String,
    pub status: ComponentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_incident_has_no_affected_components() {
        let incident = Incident::new(
            "API outage".to_string(),
            "Requests failing".to_string(),
            IncidentStatus::Investigating,
            IncidentImpact::Minor,
        );

        assert!(incident.affected_components.is_empty());
        assert!(incident.is_active());
    }

    #[test]
    fn test_resolved_incident_is_inactive() {
        let mut incident = Incident::new(
            "API outage".to_string(),
            "Requests failing".to_string(),
            IncidentStatus::Investigating,
            IncidentImpact::Major,
        );
        incident.status = IncidentStatus::Resolved;
        assert!(!incident.is_active());
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(IncidentStatus::Investigating.to_string(), "investigating");
        assert_eq!(IncidentImpact::Critical.to_string(), "critical");
        assert_eq!(
            "monitoring".parse::<IncidentStatus>().unwrap(),
            IncidentStatus::Monitoring
        );
    }
}
