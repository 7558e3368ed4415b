use crate::error::Result;
use crate::models::{Incident, IncidentImpact, IncidentStatus};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Domain event emitted after an incident is committed.
///
/// Dispatch is fire-and-forget: subscriber failures are logged and never
/// roll back or fail the incident operation.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentCreated {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: IncidentStatus,
    pub impact: IncidentImpact,
    /// Link to the incident on the public page, when a public URL is configured
    pub url: Option<String>,
}

impl IncidentCreated {
    pub fn from_incident(incident: &Incident, public_url: Option<&str>) -> Self {
        Self {
            id: incident.id,
            title: incident.title.clone(),
            description: incident.description.clone(),
            status: incident.status,
            impact: incident.impact,
            url: public_url.map(|base| format!("{}/incidents/{}", base.trim_end_matches('/'), incident.id)),
        }
    }
}

/// A subscriber to engine domain events
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Subscriber name, used in dispatch logs
    fn name(&self) -> &str;

    async fn incident_created(&self, event: &IncidentCreated) -> Result<()>;
}

/// Fan an event out to every subscriber on a detached task. Errors are
/// logged per subscriber; nothing propagates to the caller.
pub(crate) fn dispatch_incident_created(notifiers: &[Arc<dyn Notifier>], event: IncidentCreated) {
    for notifier in notifiers {
        let notifier = notifier.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.incident_created(&event).await {
                tracing::error!(
                    notifier = notifier.name(),
                    incident_id = %event.id,
                    error = %e,
                    "Failed to deliver incident-created notification"
                );
            }
        });
    }
}

/// Notifier that just logs events, useful as a default subscriber
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn incident_created(&self, event: &IncidentCreated) -> Result<()> {
        tracing::info!(
            incident_id = %event.id,
            title = %event.title,
            status = %event.status,
            impact = %event.impact,
            "Incident created"
        );
        Ok(())
    }
}

/// Notifier that forwards events over a channel, for tests and embedders
/// that want to consume events in-process
pub struct ChannelNotifier {
    tx: tokio::sync::mpsc::UnboundedSender<IncidentCreated>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<IncidentCreated>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    fn name(&self) -> &str {
        "channel"
    }

    async fn incident_created(&self, event: &IncidentCreated) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|e| crate::error::EngineError::Notification(e.to_string()))
    }
}
