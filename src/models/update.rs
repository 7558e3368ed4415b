use crate::models::{ComponentStatus, IncidentImpact, IncidentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// One immutable entry in an incident's audit trail.
///
/// Updates are append-only: they are never mutated or deleted after creation.
/// Diff fields are present only if the value actually changed versus the
/// incident's state immediately before the update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentUpdate {
    /// Unique identifier
    pub id: Uuid,

    /// Owning incident
    pub incident_id: Uuid,

    /// Optional free-text message
    pub description: Option<String>,

    /// What kind of update this is
    pub kind: IncidentUpdateKind,

    /// Incident status transition, if the status changed
    pub status_update: Option<StatusUpdate>,

    /// Incident impact transition, if the impact changed
    pub impact_update: Option<ImpactUpdate>,

    /// Component status writes performed as part of this update
    #[serde(default)]
    pub component_status_updates: Vec<ComponentStatusUpdate>,

    /// Creation timestamp, immutable thereafter
    pub created_at: DateTime<Utc>,
}

impl IncidentUpdate {
    /// Build a draft update for an incident. Component status entries are
    /// filled in by the store at commit time, from values read under the
    /// same write guard that applies them.
    pub fn draft(incident_id: Uuid, kind: IncidentUpdateKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            description: None,
            kind,
            status_update: None,
            impact_update: None,
            component_status_updates: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Update kind
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentUpdateKind {
    Created,
    Updated,
    Resolved,
    Closed,
}

/// Incident status transition. `from` is `None` only on the first update of
/// an incident (the `created` entry).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub from: Option<IncidentStatus>,
    pub to: IncidentStatus,
}

/// Incident impact transition, same `from` convention as [`StatusUpdate`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactUpdate {
    pub from: Option<IncidentImpact>,
    pub to: IncidentImpact,
}

/// One component status write. `from` is the component's true status
/// immediately before this update was applied, never a cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatusUpdate {
    pub component_id: Uuid,
    pub from: ComponentStatus,
    pub to: ComponentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_has_no_diffs() {
        let incident_id = Uuid::new_v4();
        let update = IncidentUpdate::draft(incident_id, IncidentUpdateKind::Updated);

        assert_eq!(update.incident_id, incident_id);
        assert!(update.status_update.is_none());
        assert!(update.impact_update.is_none());
        assert!(update.component_status_updates.is_empty());
    }

    #[test]
    fn test_kind_string_forms() {
        assert_eq!(IncidentUpdateKind::Created.to_string(), "created");
        assert_eq!(
            "resolved".parse::<IncidentUpdateKind>().unwrap(),
            IncidentUpdateKind::Resolved
        );
    }
}
