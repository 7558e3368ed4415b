use crate::error::{EngineError, Result};
use crate::models::{
    AffectedComponent, Component, ComponentStatus, ComponentStatusUpdate, Group, Incident,
    IncidentUpdate, IncidentUpdateKind,
};
use crate::state::{upsert_affected, CommitOutcome, CommitRequest, IncidentFilter, StatusPageStore};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory status page store (the default backend, and the one tests use).
///
/// All records live behind one RwLock. Commits take the write guard, reads
/// take the read guard, so readers never observe a half-applied commit unit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    components: HashMap<Uuid, Component>,
    groups: HashMap<Uuid, Group>,
    incidents: HashMap<Uuid, Incident>,
    updates: HashMap<Uuid, Vec<IncidentUpdate>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusPageStore for InMemoryStore {
    async fn create_component(&self, component: &Component) -> Result<()> {
        let mut inner = self.inner.write();
        inner.components.insert(component.id, component.clone());
        tracing::debug!(component_id = %component.id, "Component saved");
        Ok(())
    }

    async fn find_component(&self, id: &Uuid) -> Result<Option<Component>> {
        Ok(self.inner.read().components.get(id).cloned())
    }

    async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<Component>> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.components.get(id).cloned())
            .collect())
    }

    async fn list_components(&self) -> Result<Vec<Component>> {
        let mut components: Vec<Component> = self.inner.read().components.values().cloned().collect();
        components.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(components)
    }

    async fn update_component_status(
        &self,
        id: &Uuid,
        to: ComponentStatus,
    ) -> Result<ComponentStatusUpdate> {
        let mut inner = self.inner.write();
        let component = inner
            .components
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("Component {} not found", id)))?;

        let from = component.status;
        component.status = to;
        component.version += 1;
        component.updated_at = Utc::now();

        tracing::debug!(component_id = %id, %from, %to, "Component status updated");
        Ok(ComponentStatusUpdate {
            component_id: *id,
            from,
            to,
        })
    }

    async fn create_group(&self, group: &Group) -> Result<()> {
        let mut inner = self.inner.write();
        inner.groups.insert(group.id, group.clone());
        tracing::debug!(group_id = %group.id, "Group saved");
        Ok(())
    }

    async fn find_group(&self, id: &Uuid) -> Result<Option<Group>> {
        Ok(self.inner.read().groups.get(id).cloned())
    }

    async fn list_groups_with_members(&self) -> Result<Vec<(Group, Vec<Component>)>> {
        let inner = self.inner.read();
        let mut groups: Vec<Group> = inner.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(groups
            .into_iter()
            .map(|group| {
                let members = group
                    .components
                    .iter()
                    .filter_map(|id| inner.components.get(id).cloned())
                    .collect();
                (group, members)
            })
            .collect())
    }

    async fn find_incident(&self, id: &Uuid) -> Result<Option<Incident>> {
        Ok(self.inner.read().incidents.get(id).cloned())
    }

    async fn save_incident(&self, incident: &Incident) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.incidents.contains_key(&incident.id) {
            return Err(EngineError::NotFound(format!(
                "Incident {} not found",
                incident.id
            )));
        }
        inner.incidents.insert(incident.id, incident.clone());
        tracing::debug!(incident_id = %incident.id, "Incident row saved");
        Ok(())
    }

    async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        let mut incidents: Vec<Incident> = self
            .inner
            .read()
            .incidents
            .values()
            .filter(|incident| filter.matches(incident))
            .cloned()
            .collect();

        // Newest first
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn list_updates(&self, incident_id: &Uuid) -> Result<Vec<IncidentUpdate>> {
        Ok(self
            .inner
            .read()
            .updates
            .get(incident_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome> {
        let mut inner = self.inner.write();

        if request.update.kind != IncidentUpdateKind::Created
            && !inner.incidents.contains_key(&request.incident.id)
        {
            return Err(EngineError::NotFound(format!(
                "Incident {} not found",
                request.incident.id
            )));
        }

        let now = Utc::now();
        let mut applied = Vec::new();
        let mut snapshots = Vec::new();
        let mut skipped = Vec::new();

        for target in &request.targets {
            match inner.components.get_mut(&target.component_id) {
                None => skipped.push(target.component_id),
                Some(component) => {
                    // `from` is read here, under the same guard that applies
                    // the write, never earlier in the request
                    let from = component.status;
                    if target.only_if_changed && from == target.to {
                        continue;
                    }
                    component.status = target.to;
                    component.version += 1;
                    component.updated_at = now;
                    applied.push(ComponentStatusUpdate {
                        component_id: target.component_id,
                        from,
                        to: target.to,
                    });
                    // Snapshots track recorded writes only, so folding the
                    // log reproduces them exactly
                    snapshots.push(AffectedComponent {
                        component_id: target.component_id,
                        name: component.name.clone(),
                        status: target.to,
                    });
                }
            }
        }

        let mut incident = request.incident;
        for snapshot in snapshots {
            upsert_affected(&mut incident.affected_components, snapshot);
        }
        incident.updated_at = now;

        let mut update = request.update;
        update.component_status_updates = applied;

        inner.incidents.insert(incident.id, incident.clone());
        inner
            .updates
            .entry(incident.id)
            .or_default()
            .push(update.clone());

        tracing::debug!(
            incident_id = %incident.id,
            update_id = %update.id,
            component_writes = update.component_status_updates.len(),
            skipped = skipped.len(),
            "Commit applied"
        );

        Ok(CommitOutcome {
            incident,
            update,
            skipped,
        })
    }
}
