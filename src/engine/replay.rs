//! Update-log replay and consistency checking.
//!
//! The update log is the single source of truth; the incident row is a cache
//! of the fold. These functions recompute the fold, compare it against the
//! materialized row and live component state, and can rebuild the row if it
//! is ever lost or corrupted.

use crate::engine::IncidentEngine;
use crate::error::{EngineError, Result};
use crate::models::{
    AffectedComponent, ComponentStatus, Incident, IncidentImpact, IncidentStatus, IncidentUpdate,
};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

/// State derived by folding an incident's update log in creation order
#[derive(Debug, Clone, Default)]
pub struct FoldedIncident {
    pub status: Option<IncidentStatus>,
    pub impact: Option<IncidentImpact>,
    /// Latest recorded status per component this incident touched
    pub component_statuses: HashMap<Uuid, ComponentStatus>,
}

/// Fold an ordered update log into the state it implies
pub fn fold_updates(updates: &[IncidentUpdate]) -> FoldedIncident {
    let mut folded = FoldedIncident::default();
    for update in updates {
        if let Some(change) = update.status_update {
            folded.status = Some(change.to);
        }
        if let Some(change) = update.impact_update {
            folded.impact = Some(change.to);
        }
        for change in &update.component_status_updates {
            folded
                .component_statuses
                .insert(change.component_id, change.to);
        }
    }
    folded
}

/// A disagreement between the fold and the materialized incident row
#[derive(Debug, Clone)]
pub struct SnapshotMismatch {
    pub component_id: Uuid,
    pub folded: Option<ComponentStatus>,
    pub materialized: Option<ComponentStatus>,
}

/// A component whose live status no longer matches this incident's last
/// write. Not an inconsistency: another incident or a direct admin edit
/// legitimately owns the later write.
#[derive(Debug, Clone)]
pub struct LiveDivergence {
    pub component_id: Uuid,
    pub folded: ComponentStatus,
    pub live: Option<ComponentStatus>,
}

/// Result of checking an incident's materialized row against its log
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub incident_id: Uuid,
    pub folded: FoldedIncident,
    pub status_consistent: bool,
    pub impact_consistent: bool,
    pub snapshot_mismatches: Vec<SnapshotMismatch>,
    pub live_divergences: Vec<LiveDivergence>,
}

impl ReplayReport {
    /// True when the materialized row equals the fold of the log.
    /// Live divergences do not count against consistency.
    pub fn is_consistent(&self) -> bool {
        self.status_consistent && self.impact_consistent && self.snapshot_mismatches.is_empty()
    }
}

impl IncidentEngine {
    /// Fold an incident's update log into the state it implies
    pub async fn replay_incident(&self, incident_id: &Uuid) -> Result<FoldedIncident> {
        self.get_incident(incident_id).await?;
        let updates = self.store().list_updates(incident_id).await?;
        Ok(fold_updates(&updates))
    }

    /// Recompute an incident's state from its log and compare it against
    /// the materialized row and live component state
    pub async fn verify_incident(&self, incident_id: &Uuid) -> Result<ReplayReport> {
        let incident = self.get_incident(incident_id).await?;
        let updates = self.store().list_updates(incident_id).await?;
        let folded = fold_updates(&updates);

        let status_consistent = folded.status == Some(incident.status);
        let impact_consistent = folded.impact == Some(incident.impact);

        let mut snapshot_mismatches = Vec::new();
        for (component_id, folded_status) in &folded.component_statuses {
            let materialized = incident.affected(component_id).map(|entry| entry.status);
            if materialized != Some(*folded_status) {
                snapshot_mismatches.push(SnapshotMismatch {
                    component_id: *component_id,
                    folded: Some(*folded_status),
                    materialized,
                });
            }
        }
        for entry in &incident.affected_components {
            if !folded.component_statuses.contains_key(&entry.component_id) {
                snapshot_mismatches.push(SnapshotMismatch {
                    component_id: entry.component_id,
                    folded: None,
                    materialized: Some(entry.status),
                });
            }
        }

        let mut live_divergences = Vec::new();
        for (component_id, folded_status) in &folded.component_statuses {
            let live = self
                .store()
                .find_component(component_id)
                .await?
                .map(|component| component.status);
            if live != Some(*folded_status) {
                live_divergences.push(LiveDivergence {
                    component_id: *component_id,
                    folded: *folded_status,
                    live,
                });
            }
        }

        let report = ReplayReport {
            incident_id: *incident_id,
            folded,
            status_consistent,
            impact_consistent,
            snapshot_mismatches,
            live_divergences,
        };

        if !report.is_consistent() {
            tracing::error!(
                incident_id = %incident_id,
                status_consistent = report.status_consistent,
                impact_consistent = report.impact_consistent,
                snapshot_mismatches = report.snapshot_mismatches.len(),
                "Materialized incident state disagrees with its update log"
            );
        }

        Ok(report)
    }

    /// Rebuild the materialized incident row by folding its update log.
    /// Title and description are not logged and are kept as-is.
    pub async fn rebuild_incident(&self, incident_id: &Uuid) -> Result<Incident> {
        let lock = self.incident_lock(incident_id);
        let _serial = lock.lock().await;

        let mut incident = self
            .store()
            .find_incident(incident_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Incident {} not found", incident_id)))?;

        let updates = self.store().list_updates(incident_id).await?;
        if updates.is_empty() {
            return Err(EngineError::Consistency(format!(
                "Incident {} has no update log to rebuild from",
                incident_id
            )));
        }

        let folded = fold_updates(&updates);

        if let Some(status) = folded.status {
            incident.status = status;
        }
        if let Some(impact) = folded.impact {
            incident.impact = impact;
        }

        incident
            .affected_components
            .retain(|entry| folded.component_statuses.contains_key(&entry.component_id));
        for (component_id, status) in &folded.component_statuses {
            if let Some(entry) = incident
                .affected_components
                .iter_mut()
                .find(|entry| entry.component_id == *component_id)
            {
                entry.status = *status;
            } else {
                let name = self
                    .store()
                    .find_component(component_id)
                    .await?
                    .map(|component| component.name)
                    .unwrap_or_default();
                incident.affected_components.push(AffectedComponent {
                    component_id: *component_id,
                    name,
                    status: *status,
                });
            }
        }
        incident.updated_at = Utc::now();

        self.store().save_incident(&incident).await?;

        tracing::info!(incident_id = %incident_id, "Incident row rebuilt from update log");
        Ok(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentStatusUpdate, IncidentUpdateKind, StatusUpdate};

    fn update_with(
        incident_id: Uuid,
        kind: IncidentUpdateKind,
        status: Option<StatusUpdate>,
        components: Vec<ComponentStatusUpdate>,
    ) -> IncidentUpdate {
        let mut update = IncidentUpdate::draft(incident_id, kind);
        update.status_update = status;
        update.component_status_updates = components;
        update
    }

    #[test]
    fn test_fold_empty_log() {
        let folded = fold_updates(&[]);
        assert!(folded.status.is_none());
        assert!(folded.impact.is_none());
        assert!(folded.component_statuses.is_empty());
    }

    #[test]
    fn test_fold_takes_last_write_per_field() {
        let incident_id = Uuid::new_v4();
        let component_id = Uuid::new_v4();

        let log = vec![
            update_with(
                incident_id,
                IncidentUpdateKind::Created,
                Some(StatusUpdate {
                    from: None,
                    to: IncidentStatus::Investigating,
                }),
                vec![ComponentStatusUpdate {
                    component_id,
                    from: ComponentStatus::Operational,
                    to: ComponentStatus::Major,
                }],
            ),
            update_with(
                incident_id,
                IncidentUpdateKind::Resolved,
                Some(StatusUpdate {
                    from: Some(IncidentStatus::Investigating),
                    to: IncidentStatus::Resolved,
                }),
                vec![ComponentStatusUpdate {
                    component_id,
                    from: ComponentStatus::Major,
                    to: ComponentStatus::Operational,
                }],
            ),
        ];

        let folded = fold_updates(&log);
        assert_eq!(folded.status, Some(IncidentStatus::Resolved));
        assert_eq!(
            folded.component_statuses.get(&component_id),
            Some(&ComponentStatus::Operational)
        );
    }
}
