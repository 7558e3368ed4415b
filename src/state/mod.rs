pub mod factory;
pub mod memory;
pub mod sled_store;

pub use factory::create_store;
pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use crate::error::Result;
use crate::models::{
    AffectedComponent, Component, ComponentStatus, ComponentStatusUpdate, Group, Incident,
    IncidentImpact, IncidentStatus, IncidentUpdate,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Add or refresh an incident's snapshot entry for a component
pub(crate) fn upsert_affected(list: &mut Vec<AffectedComponent>, entry: AffectedComponent) {
    if let Some(existing) = list
        .iter_mut()
        .find(|candidate| candidate.component_id == entry.component_id)
    {
        existing.name = entry.name;
        existing.status = entry.status;
    } else {
        list.push(entry);
    }
}

/// Filter for querying incidents
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub statuses: Vec<IncidentStatus>,
    pub impacts: Vec<IncidentImpact>,
    pub active_only: bool,
}

impl IncidentFilter {
    pub fn matches(&self, incident: &Incident) -> bool {
        let status_match = self.statuses.is_empty() || self.statuses.contains(&incident.status);
        let impact_match = self.impacts.is_empty() || self.impacts.contains(&incident.impact);
        let active_match = !self.active_only || incident.is_active();
        status_match && impact_match && active_match
    }
}

/// A requested component status write inside a commit unit.
///
/// With `only_if_changed` set, the write and its log entry are dropped when
/// the component is already at the target status (the resolve cascade uses
/// this so already-operational components are untouched).
#[derive(Debug, Clone)]
pub struct ComponentTarget {
    pub component_id: Uuid,
    pub to: ComponentStatus,
    pub only_if_changed: bool,
}

impl ComponentTarget {
    pub fn set(component_id: Uuid, to: ComponentStatus) -> Self {
        Self {
            component_id,
            to,
            only_if_changed: false,
        }
    }

    pub fn set_if_changed(component_id: Uuid, to: ComponentStatus) -> Self {
        Self {
            component_id,
            to,
            only_if_changed: true,
        }
    }
}

/// The atomic unit of an engine operation: the staged incident row, one
/// draft log entry, and the component status writes to perform.
///
/// The store applies all of it under a single write guard. Component `from`
/// values are read there, never earlier, so they are exact at write time.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub incident: Incident,
    pub update: IncidentUpdate,
    pub targets: Vec<ComponentTarget>,
}

/// Result of a commit: the refreshed incident row, the finalized log entry,
/// and any target ids that did not resolve to a real component.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub incident: Incident,
    pub update: IncidentUpdate,
    pub skipped: Vec<Uuid>,
}

/// Storage surface consumed by the incident engine.
///
/// Reads are consistent with respect to commits: a partially applied commit
/// unit is never observable.
#[async_trait]
pub trait StatusPageStore: Send + Sync {
    // Components

    async fn create_component(&self, component: &Component) -> Result<()>;

    async fn find_component(&self, id: &Uuid) -> Result<Option<Component>>;

    /// Resolve components by id; unknown ids are silently absent from the result
    async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<Component>>;

    async fn list_components(&self) -> Result<Vec<Component>>;

    /// Direct admin status write. The pre-write status is read atomically
    /// with the write and returned as the `from` of the change.
    async fn update_component_status(
        &self,
        id: &Uuid,
        to: ComponentStatus,
    ) -> Result<ComponentStatusUpdate>;

    // Groups

    async fn create_group(&self, group: &Group) -> Result<()>;

    async fn find_group(&self, id: &Uuid) -> Result<Option<Group>>;

    /// All groups, each joined with its member components in member order
    async fn list_groups_with_members(&self) -> Result<Vec<(Group, Vec<Component>)>>;

    // Incidents

    async fn find_incident(&self, id: &Uuid) -> Result<Option<Incident>>;

    /// Write the incident row without touching the update log. Only for
    /// metadata edits that the log does not reproduce (title/description).
    async fn save_incident(&self, incident: &Incident) -> Result<()>;

    /// List incidents matching the filter, newest first
    async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>>;

    /// The incident's update log in creation order (oldest first)
    async fn list_updates(&self, incident_id: &Uuid) -> Result<Vec<IncidentUpdate>>;

    /// Apply a whole commit unit atomically: perform the component writes
    /// (capturing true `from` values), refresh the incident's affected
    /// component snapshots, write the incident row, and append the update.
    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome>;
}
