pub mod replay;

pub use replay::{fold_updates, FoldedIncident, LiveDivergence, ReplayReport, SnapshotMismatch};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{
    Component, ComponentStatus, CreateIncident, Group, ImpactUpdate, Incident, IncidentImpact,
    IncidentStatus, IncidentUpdate, IncidentUpdateKind, PostIncidentUpdate, StatusUpdate,
    UpdateIncidentFields,
};
use crate::notifications::{dispatch_incident_created, IncidentCreated, Notifier, TracingNotifier};
use crate::state::{create_store, CommitRequest, ComponentTarget, IncidentFilter, StatusPageStore};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

/// Default message appended when an incident is resolved without one
pub const RESOLVED_MESSAGE: &str = "Incident has been resolved.";

/// The incident lifecycle and status propagation engine.
///
/// The engine is the only writer of the incident row, the update log and
/// incident-driven component status changes. Each mutating operation loads
/// current state, computes the diffs, and applies the whole unit (incident
/// row + one log entry + N component writes) in a single store commit.
///
/// Operations on the same incident are serialized through a per-incident
/// lock so two concurrent updates can never both compute their diffs from
/// the same stale read. Different incidents proceed in parallel; component
/// writes racing across incidents are legitimate, and each log entry's
/// `from` is captured inside its own commit, so the last committed write
/// wins without corrupting any audit trail.
pub struct IncidentEngine {
    store: Arc<dyn StatusPageStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
    public_url: Option<String>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl IncidentEngine {
    pub fn new(store: Arc<dyn StatusPageStore>) -> Self {
        Self {
            store,
            notifiers: Vec::new(),
            public_url: None,
            locks: DashMap::new(),
        }
    }

    /// Build an engine from configuration: the configured store backend,
    /// a tracing notifier when notifications are enabled, and the public
    /// URL for notification links
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = create_store(&config.state)?;
        let mut engine = Self::new(store);
        if config.notifications.enabled {
            engine = engine.with_notifier(Arc::new(TracingNotifier));
        }
        if let Some(url) = &config.notifications.public_url {
            engine = engine.with_public_url(url.clone());
        }
        Ok(engine)
    }

    /// Subscribe a notifier to engine domain events
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Set the public base URL used in notification payloads
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &Arc<dyn StatusPageStore> {
        &self.store
    }

    fn incident_lock(&self, id: &Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Open a new incident.
    ///
    /// Defaults: status investigating, impact minor. Every referenced
    /// component is set to the requested status; ids that do not resolve
    /// are dropped with a warning. The `created` log entry records the
    /// initial status and impact (with `from = None`) and one entry per
    /// resolved component, with `from` captured at write time.
    pub async fn create_incident(&self, request: CreateIncident) -> Result<Incident> {
        request.validate()?;

        let status = request.status.unwrap_or(IncidentStatus::Investigating);
        let impact = request.impact.unwrap_or(IncidentImpact::Minor);

        let incident = Incident::new(request.title, request.description, status, impact);

        let mut update = IncidentUpdate::draft(incident.id, IncidentUpdateKind::Created);
        update.status_update = Some(StatusUpdate {
            from: None,
            to: status,
        });
        // The initial impact is logged too, so the fold alone reproduces it
        update.impact_update = Some(ImpactUpdate {
            from: None,
            to: impact,
        });

        let targets = request
            .affected_components
            .iter()
            .map(|entry| ComponentTarget::set(entry.id, entry.status))
            .collect();

        let lock = self.incident_lock(&incident.id);
        let outcome = {
            let _serial = lock.lock().await;
            self.store
                .commit(CommitRequest {
                    incident,
                    update,
                    targets,
                })
                .await?
        };

        if !outcome.skipped.is_empty() {
            tracing::warn!(
                incident_id = %outcome.incident.id,
                skipped = ?outcome.skipped,
                "Dropped affected component ids that did not resolve"
            );
        }

        tracing::info!(
            incident_id = %outcome.incident.id,
            status = %outcome.incident.status,
            impact = %outcome.incident.impact,
            affected = outcome.incident.affected_components.len(),
            "Incident created"
        );

        let event = IncidentCreated::from_incident(&outcome.incident, self.public_url.as_deref());
        dispatch_incident_created(&self.notifiers, event);

        Ok(outcome.incident)
    }

    /// Append an update to an incident.
    ///
    /// Stages status/impact changes only when the value actually differs
    /// (no no-op diff entries); component entries follow the same rule. The
    /// update kind is the caller's if given, else `resolved` when the
    /// request sets the status to resolved, else `updated`.
    /// Posting `status = resolved` triggers the resolve cascade: every
    /// affected component not already operational is forced back to
    /// operational, with an explicit log entry each.
    pub async fn post_incident_update(
        &self,
        incident_id: Uuid,
        request: PostIncidentUpdate,
    ) -> Result<IncidentUpdate> {
        request.validate()?;

        let lock = self.incident_lock(&incident_id);
        let _serial = lock.lock().await;

        let incident = self
            .store
            .find_incident(&incident_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Incident {} not found", incident_id)))?;

        let previous_status = incident.status;
        let previous_impact = incident.impact;

        let mut staged = incident;
        let mut update = IncidentUpdate::draft(incident_id, IncidentUpdateKind::Updated);

        if let Some(status) = request.status {
            if status != previous_status {
                staged.status = status;
                update.status_update = Some(StatusUpdate {
                    from: Some(previous_status),
                    to: status,
                });
            }
        }

        if let Some(impact) = request.impact {
            if impact != previous_impact {
                staged.impact = impact;
                update.impact_update = Some(ImpactUpdate {
                    from: Some(previous_impact),
                    to: impact,
                });
            }
        }

        let resolving = request.status == Some(IncidentStatus::Resolved);

        update.kind = request.kind.unwrap_or(if resolving {
            IncidentUpdateKind::Resolved
        } else {
            IncidentUpdateKind::Updated
        });

        update.description = request
            .description
            .clone()
            .or_else(|| resolving.then(|| RESOLVED_MESSAGE.to_string()));

        // Like the status/impact diffs above, component entries are recorded
        // only when the value actually changes
        let mut targets: Vec<ComponentTarget> = request
            .component_updates
            .iter()
            .map(|entry| ComponentTarget::set_if_changed(entry.id, entry.status))
            .collect();

        if resolving {
            // The resolve cascade: a resolved incident must never leave an
            // affected component degraded, whatever the caller asked for
            for affected in &staged.affected_components {
                targets.retain(|target| target.component_id != affected.component_id);
                targets.push(ComponentTarget::set_if_changed(
                    affected.component_id,
                    ComponentStatus::Operational,
                ));
            }
        }

        let outcome = self
            .store
            .commit(CommitRequest {
                incident: staged,
                update,
                targets,
            })
            .await?;

        if !outcome.skipped.is_empty() {
            tracing::warn!(
                incident_id = %incident_id,
                skipped = ?outcome.skipped,
                "Dropped component updates that did not resolve"
            );
        }

        tracing::info!(
            incident_id = %incident_id,
            update_id = %outcome.update.id,
            kind = %outcome.update.kind,
            component_writes = outcome.update.component_status_updates.len(),
            "Incident update appended"
        );

        Ok(outcome.update)
    }

    /// Resolve an incident: sugar over [`Self::post_incident_update`] with
    /// `status = resolved`
    pub async fn resolve_incident(
        &self,
        incident_id: Uuid,
        description: Option<String>,
    ) -> Result<IncidentUpdate> {
        self.post_incident_update(
            incident_id,
            PostIncidentUpdate {
                description,
                status: Some(IncidentStatus::Resolved),
                ..Default::default()
            },
        )
        .await
    }

    /// Get an incident by id
    pub async fn get_incident(&self, id: &Uuid) -> Result<Incident> {
        self.store
            .find_incident(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Incident {} not found", id)))
    }

    /// List incidents matching the filter, newest first
    pub async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        self.store.list_incidents(filter).await
    }

    /// The incident's update log, newest first
    pub async fn list_incident_updates(&self, incident_id: &Uuid) -> Result<Vec<IncidentUpdate>> {
        self.get_incident(incident_id).await?;
        let mut updates = self.store.list_updates(incident_id).await?;
        updates.reverse();
        Ok(updates)
    }

    /// Edit incident metadata (title/description) without touching the
    /// update log. Status, impact and component changes must go through
    /// [`Self::post_incident_update`].
    pub async fn update_incident_fields(
        &self,
        incident_id: Uuid,
        request: UpdateIncidentFields,
    ) -> Result<Incident> {
        request.validate()?;

        let lock = self.incident_lock(&incident_id);
        let _serial = lock.lock().await;

        let mut incident = self
            .store
            .find_incident(&incident_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Incident {} not found", incident_id)))?;

        if let Some(title) = request.title {
            incident.title = title;
        }
        if let Some(description) = request.description {
            incident.description = description;
        }
        incident.updated_at = Utc::now();

        self.store.save_incident(&incident).await?;

        tracing::info!(incident_id = %incident_id, "Incident metadata updated");
        Ok(incident)
    }

    /// Derive a group's display status from its members' current statuses
    pub async fn group_status(&self, group_id: &Uuid) -> Result<ComponentStatus> {
        let group = self
            .store
            .find_group(group_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Group {} not found", group_id)))?;

        let members = self.store.find_components(&group.components).await?;
        let statuses: Vec<ComponentStatus> = members.iter().map(|c| c.status).collect();
        Ok(Group::aggregate_status(&statuses))
    }

    /// All groups joined with their members and derived status, for the
    /// public dashboard
    pub async fn group_overview(&self) -> Result<Vec<GroupStatusView>> {
        let joined = self.store.list_groups_with_members().await?;
        Ok(joined
            .into_iter()
            .map(|(group, members)| {
                let statuses: Vec<ComponentStatus> =
                    members.iter().map(|c| c.status).collect();
                let status = Group::aggregate_status(&statuses);
                GroupStatusView {
                    group,
                    members,
                    status,
                }
            })
            .collect())
    }
}

/// A group joined with its member components and derived display status
#[derive(Debug, Clone)]
pub struct GroupStatusView {
    pub group: Group,
    pub members: Vec<Component>,
    pub status: ComponentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentStatusRef;
    use crate::state::InMemoryStore;

    fn engine() -> IncidentEngine {
        IncidentEngine::new(Arc::new(InMemoryStore::new()))
    }

    async fn seed_component(
        engine: &IncidentEngine,
        name: &str,
        status: ComponentStatus,
    ) -> Component {
        let component =
            Component::with_status(name.to_string(), format!("{} component", name), status);
        engine.store().create_component(&component).await.unwrap();
        component
    }

    #[tokio::test]
    async fn test_from_config_builds_default_engine() {
        let config = EngineConfig {
            state: Default::default(),
            notifications: Default::default(),
        };
        let engine = IncidentEngine::from_config(&config).unwrap();
        assert_eq!(engine.notifiers.len(), 1);
        assert!(engine.public_url.is_none());
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let engine = engine();
        let incident = engine
            .create_incident(CreateIncident {
                title: "API outage".to_string(),
                description: "Requests failing".to_string(),
                status: None,
                impact: None,
                affected_components: vec![],
            })
            .await
            .unwrap();

        assert_eq!(incident.status, IncidentStatus::Investigating);
        assert_eq!(incident.impact, IncidentImpact::Minor);

        let updates = engine.list_incident_updates(&incident.id).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, IncidentUpdateKind::Created);
        assert_eq!(
            updates[0].status_update,
            Some(StatusUpdate {
                from: None,
                to: IncidentStatus::Investigating
            })
        );
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let engine = engine();
        let err = engine
            .create_incident(CreateIncident {
                title: "".to_string(),
                description: "Requests failing".to_string(),
                status: None,
                impact: None,
                affected_components: vec![],
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_post_update_on_missing_incident_is_not_found() {
        let engine = engine();
        let err = engine
            .post_incident_update(Uuid::new_v4(), PostIncidentUpdate::default())
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_post_update_suppresses_noop_status_diff() {
        let engine = engine();
        let incident = engine
            .create_incident(CreateIncident {
                title: "API outage".to_string(),
                description: "Requests failing".to_string(),
                status: Some(IncidentStatus::Identified),
                impact: None,
                affected_components: vec![],
            })
            .await
            .unwrap();

        let update = engine
            .post_incident_update(
                incident.id,
                PostIncidentUpdate {
                    status: Some(IncidentStatus::Identified),
                    description: Some("Still looking".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(update.status_update.is_none());
        assert_eq!(update.kind, IncidentUpdateKind::Updated);
    }

    #[tokio::test]
    async fn test_update_fields_does_not_append_log_entries() {
        let engine = engine();
        let incident = engine
            .create_incident(CreateIncident {
                title: "API outage".to_string(),
                description: "Requests failing".to_string(),
                status: None,
                impact: None,
                affected_components: vec![],
            })
            .await
            .unwrap();

        let edited = engine
            .update_incident_fields(
                incident.id,
                UpdateIncidentFields {
                    title: Some("API outage (us-east)".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.title, "API outage (us-east)");
        let updates = engine.list_incident_updates(&incident.id).await.unwrap();
        assert_eq!(updates.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_component_ids_are_dropped() {
        let engine = engine();
        let api = seed_component(&engine, "API", ComponentStatus::Operational).await;

        let incident = engine
            .create_incident(CreateIncident {
                title: "API outage".to_string(),
                description: "Requests failing".to_string(),
                status: None,
                impact: None,
                affected_components: vec![
                    ComponentStatusRef {
                        id: api.id,
                        status: ComponentStatus::Major,
                    },
                    ComponentStatusRef {
                        id: Uuid::new_v4(),
                        status: ComponentStatus::Major,
                    },
                ],
            })
            .await
            .unwrap();

        assert_eq!(incident.affected_components.len(), 1);
        assert_eq!(incident.affected_components[0].component_id, api.id);
    }

    #[tokio::test]
    async fn test_group_status_is_derived_from_members() {
        let engine = engine();
        let api = seed_component(&engine, "API", ComponentStatus::Operational).await;
        let db = seed_component(&engine, "Database", ComponentStatus::UnderMaintenance).await;

        let group = Group::new(
            "Core".to_string(),
            "Core services".to_string(),
            vec![api.id, db.id],
        );
        engine.store().create_group(&group).await.unwrap();

        let status = engine.group_status(&group.id).await.unwrap();
        assert_eq!(status, ComponentStatus::UnderMaintenance);

        let overview = engine.group_overview().await.unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].members.len(), 2);
        assert_eq!(overview[0].status, ComponentStatus::UnderMaintenance);
    }
}
