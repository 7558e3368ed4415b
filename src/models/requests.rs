use crate::models::{ComponentStatus, IncidentImpact, IncidentStatus, IncidentUpdateKind};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// A requested component status, by component id
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentStatusRef {
    pub id: Uuid,
    pub status: ComponentStatus,
}

/// Intent to open a new incident.
///
/// Referenced component ids that do not resolve to a real component are
/// dropped rather than rejected; the engine logs them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIncident {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(min = 1))]
    pub description: String,

    /// Defaults to investigating
    pub status: Option<IncidentStatus>,

    /// Defaults to minor
    pub impact: Option<IncidentImpact>,

    /// Components to mark affected, with the status to set each one to
    #[serde(default)]
    pub affected_components: Vec<ComponentStatusRef>,
}

/// Intent to append an update to an existing incident.
///
/// Every field is optional; a description-only (or even empty) update is
/// valid and appends a log entry with no diff fields.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostIncidentUpdate {
    pub description: Option<String>,

    /// Explicit update kind; derived from the staged status when omitted
    pub kind: Option<IncidentUpdateKind>,

    pub status: Option<IncidentStatus>,

    pub impact: Option<IncidentImpact>,

    /// Component status writes to perform as part of this update
    #[serde(default)]
    pub component_updates: Vec<ComponentStatusRef>,
}

/// Metadata-only incident edit. Anything that changes status, impact or
/// component state must go through [`PostIncidentUpdate`] so the update log
/// stays authoritative.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateIncidentFields {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,

    #[validate(length(min = 1))]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_title_and_description() {
        let request = CreateIncident {
            title: "".to_string(),
            description: "details".to_string(),
            status: None,
            impact: None,
            affected_components: vec![],
        };
        assert!(request.validate().is_err());

        let request = CreateIncident {
            title: "Outage".to_string(),
            description: "".to_string(),
            status: None,
            impact: None,
            affected_components: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_empty_post_update_is_valid() {
        let request = PostIncidentUpdate::default();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_requests_deserialize_snake_case_enums() {
        let request: CreateIncident = serde_json::from_str(
            r#"{
                "title": "API outage",
                "description": "Requests failing",
                "status": "identified",
                "impact": "critical",
                "affected_components": [
                    {"id": "8c7f9d70-5e41-4a3c-9f4b-8f2b6f6f0a01", "status": "major"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.status, Some(IncidentStatus::Identified));
        assert_eq!(request.impact, Some(IncidentImpact::Critical));
        assert_eq!(
            request.affected_components[0].status,
            ComponentStatus::Major
        );
    }
}
