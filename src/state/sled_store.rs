use crate::error::{EngineError, Result};
use crate::models::{
    AffectedComponent, Component, ComponentStatus, ComponentStatusUpdate, Group, Incident,
    IncidentUpdate, IncidentUpdateKind,
};
use crate::state::{
    upsert_affected, CommitOutcome, CommitRequest, IncidentFilter, StatusPageStore,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent status page store using the Sled embedded database.
///
/// Four trees: components, groups, incidents, and the append-only update
/// log. Update keys are `incident_id ++ big-endian sequence number`, so a
/// prefix scan yields an incident's log in creation order. A store-wide
/// RwLock plays the same role as the in-memory backend's guard: commits hold
/// the write half, reads hold the read half.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    components_tree: sled::Tree,
    groups_tree: sled::Tree,
    incidents_tree: sled::Tree,
    updates_tree: sled::Tree,
    guard: Arc<RwLock<()>>,
}

impl SledStore {
    /// Open (or create) a Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path)
            .map_err(|e| EngineError::Storage(format!("Failed to open Sled database: {}", e)))?;

        let components_tree = db
            .open_tree("components")
            .map_err(|e| EngineError::Storage(format!("Failed to open components tree: {}", e)))?;
        let groups_tree = db
            .open_tree("groups")
            .map_err(|e| EngineError::Storage(format!("Failed to open groups tree: {}", e)))?;
        let incidents_tree = db
            .open_tree("incidents")
            .map_err(|e| EngineError::Storage(format!("Failed to open incidents tree: {}", e)))?;
        let updates_tree = db.open_tree("incident_updates").map_err(|e| {
            EngineError::Storage(format!("Failed to open incident_updates tree: {}", e))
        })?;

        tracing::info!(path = ?path.as_ref(), "Initialized Sled store");

        Ok(Self {
            db: Arc::new(db),
            components_tree,
            groups_tree,
            incidents_tree,
            updates_tree,
            guard: Arc::new(RwLock::new(())),
        })
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| EngineError::Serialization(format!("Failed to serialize record: {}", e)))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| EngineError::Serialization(format!("Failed to deserialize record: {}", e)))
    }

    fn id_key(id: &Uuid) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    fn update_key(incident_id: &Uuid, seq: u64) -> Vec<u8> {
        let mut key = incident_id.as_bytes().to_vec();
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn get_component(&self, id: &Uuid) -> Result<Option<Component>> {
        match self.components_tree.get(Self::id_key(id)) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(EngineError::Storage(format!(
                "Failed to get component: {}",
                e
            ))),
        }
    }

    fn put_component(&self, component: &Component) -> Result<()> {
        let value = Self::serialize(component)?;
        self.components_tree
            .insert(Self::id_key(&component.id), value)
            .map_err(|e| EngineError::Storage(format!("Failed to save component: {}", e)))?;
        Ok(())
    }

    fn next_update_seq(&self, incident_id: &Uuid) -> Result<u64> {
        let mut count: u64 = 0;
        for entry in self.updates_tree.scan_prefix(incident_id.as_bytes()) {
            entry.map_err(|e| {
                EngineError::Storage(format!("Failed to scan update log: {}", e))
            })?;
            count += 1;
        }
        Ok(count)
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| EngineError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl StatusPageStore for SledStore {
    async fn create_component(&self, component: &Component) -> Result<()> {
        let _guard = self.guard.write();
        self.put_component(component)?;
        self.flush()?;
        tracing::debug!(component_id = %component.id, "Component saved to Sled");
        Ok(())
    }

    async fn find_component(&self, id: &Uuid) -> Result<Option<Component>> {
        let _guard = self.guard.read();
        self.get_component(id)
    }

    async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<Component>> {
        let _guard = self.guard.read();
        let mut components = Vec::new();
        for id in ids {
            if let Some(component) = self.get_component(id)? {
                components.push(component);
            }
        }
        Ok(components)
    }

    async fn list_components(&self) -> Result<Vec<Component>> {
        let _guard = self.guard.read();
        let mut components = Vec::new();
        for entry in self.components_tree.iter() {
            let (_, value) = entry
                .map_err(|e| EngineError::Storage(format!("Failed to iterate components: {}", e)))?;
            components.push(Self::deserialize::<Component>(&value)?);
        }
        components.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(components)
    }

    async fn update_component_status(
        &self,
        id: &Uuid,
        to: ComponentStatus,
    ) -> Result<ComponentStatusUpdate> {
        let _guard = self.guard.write();
        let mut component = self
            .get_component(id)?
            .ok_or_else(|| EngineError::NotFound(format!("Component {} not found", id)))?;

        let from = component.status;
        component.status = to;
        component.version += 1;
        component.updated_at = Utc::now();
        self.put_component(&component)?;
        self.flush()?;

        tracing::debug!(component_id = %id, %from, %to, "Component status updated in Sled");
        Ok(ComponentStatusUpdate {
            component_id: *id,
            from,
            to,
        })
    }

    async fn create_group(&self, group: &Group) -> Result<()> {
        let _guard = self.guard.write();
        let value = Self::serialize(group)?;
        self.groups_tree
            .insert(Self::id_key(&group.id), value)
            .map_err(|e| EngineError::Storage(format!("Failed to save group: {}", e)))?;
        self.flush()?;
        tracing::debug!(group_id = %group.id, "Group saved to Sled");
        Ok(())
    }

    async fn find_group(&self, id: &Uuid) -> Result<Option<Group>> {
        let _guard = self.guard.read();
        match self.groups_tree.get(Self::id_key(id)) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(EngineError::Storage(format!("Failed to get group: {}", e))),
        }
    }

    async fn list_groups_with_members(&self) -> Result<Vec<(Group, Vec<Component>)>> {
        let _guard = self.guard.read();
        let mut groups = Vec::new();
        for entry in self.groups_tree.iter() {
            let (_, value) = entry
                .map_err(|e| EngineError::Storage(format!("Failed to iterate groups: {}", e)))?;
            groups.push(Self::deserialize::<Group>(&value)?);
        }
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut joined = Vec::with_capacity(groups.len());
        for group in groups {
            let mut members = Vec::with_capacity(group.components.len());
            for id in &group.components {
                if let Some(component) = self.get_component(id)? {
                    members.push(component);
                }
            }
            joined.push((group, members));
        }
        Ok(joined)
    }

    async fn find_incident(&self, id: &Uuid) -> Result<Option<Incident>> {
        let _guard = self.guard.read();
        match self.incidents_tree.get(Self::id_key(id)) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(EngineError::Storage(format!(
                "Failed to get incident: {}",
                e
            ))),
        }
    }

    async fn save_incident(&self, incident: &Incident) -> Result<()> {
        let _guard = self.guard.write();
        let key = Self::id_key(&incident.id);
        let exists = self
            .incidents_tree
            .contains_key(&key)
            .map_err(|e| EngineError::Storage(format!("Failed to check incident: {}", e)))?;
        if !exists {
            return Err(EngineError::NotFound(format!(
                "Incident {} not found",
                incident.id
            )));
        }

        let value = Self::serialize(incident)?;
        self.incidents_tree
            .insert(key, value)
            .map_err(|e| EngineError::Storage(format!("Failed to save incident: {}", e)))?;
        self.flush()?;
        tracing::debug!(incident_id = %incident.id, "Incident row saved to Sled");
        Ok(())
    }

    async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        let _guard = self.guard.read();
        let mut incidents = Vec::new();
        for entry in self.incidents_tree.iter() {
            let (_, value) = entry
                .map_err(|e| EngineError::Storage(format!("Failed to iterate incidents: {}", e)))?;
            let incident: Incident = Self::deserialize(&value)?;
            if filter.matches(&incident) {
                incidents.push(incident);
            }
        }

        // Newest first
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn list_updates(&self, incident_id: &Uuid) -> Result<Vec<IncidentUpdate>> {
        let _guard = self.guard.read();
        let mut updates = Vec::new();
        // Keys embed a big-endian sequence number, so the scan is already in
        // creation order
        for entry in self.updates_tree.scan_prefix(incident_id.as_bytes()) {
            let (_, value) = entry
                .map_err(|e| EngineError::Storage(format!("Failed to scan update log: {}", e)))?;
            updates.push(Self::deserialize::<IncidentUpdate>(&value)?);
        }
        Ok(updates)
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome> {
        let _guard = self.guard.write();

        if request.update.kind != IncidentUpdateKind::Created {
            let exists = self
                .incidents_tree
                .contains_key(Self::id_key(&request.incident.id))
                .map_err(|e| EngineError::Storage(format!("Failed to check incident: {}", e)))?;
            if !exists {
                return Err(EngineError::NotFound(format!(
                    "Incident {} not found",
                    request.incident.id
                )));
            }
        }

        let now = Utc::now();
        let mut applied = Vec::new();
        let mut snapshots = Vec::new();
        let mut skipped = Vec::new();

        for target in &request.targets {
            match self.get_component(&target.component_id)? {
                None => skipped.push(target.component_id),
                Some(mut component) => {
                    let from = component.status;
                    if target.only_if_changed && from == target.to {
                        continue;
                    }
                    component.status = target.to;
                    component.version += 1;
                    component.updated_at = now;
                    self.put_component(&component)?;
                    applied.push(ComponentStatusUpdate {
                        component_id: target.component_id,
                        from,
                        to: target.to,
                    });
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

        let incident_value = Self::serialize(&incident)?;
        self.incidents_tree
            .insert(Self::id_key(&incident.id), incident_value)
            .map_err(|e| EngineError::Storage(format!("Failed to save incident: {}", e)))?;

        let seq = self.next_update_seq(&incident.id)?;
        let update_value = Self::serialize(&update)?;
        self.updates_tree
            .insert(Self::update_key(&incident.id, seq), update_value)
            .map_err(|e| EngineError::Storage(format!("Failed to append update: {}", e)))?;

        self.flush()?;

        tracing::debug!(
            incident_id = %incident.id,
            update_id = %update.id,
            seq,
            component_writes = update.component_status_updates.len(),
            skipped = skipped.len(),
            "Commit applied to Sled"
        );

        Ok(CommitOutcome {
            incident,
            update,
            skipped,
        })
    }
}
