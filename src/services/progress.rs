//! Progress event broadcast
//!
//! Single publisher (the engine), many subscribers (WebSocket connections).
//! Lossy by design: a subscriber that falls behind may miss intermediate
//! events, but terminal `*:done` events are always published after the last
//! progress event, so a live subscriber always observes job completion.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::jobs::JobStatus;

const CHANNEL_CAPACITY: usize = 256;

/// Events published over the progress stream, wire-encoded as
/// `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ProgressEvent {
    #[serde(rename = "scan:progress")]
    ScanProgress {
        job_id: Uuid,
        total_files: i64,
        processed_files: i64,
        current_folder: Option<String>,
        new_items: i64,
        errors_count: i64,
    },
    #[serde(rename = "scan:done")]
    ScanDone { job_id: Uuid, status: JobStatus },
    #[serde(rename = "organize:progress")]
    OrganizeProgress {
        job_id: Uuid,
        total_files: i64,
        processed_files: i64,
        current_file: Option<String>,
        success_count: i64,
        failed_count: i64,
    },
    #[serde(rename = "organize:done")]
    OrganizeDone { job_id: Uuid, status: JobStatus },
}

/// Fan-out bus for progress events
#[derive(Debug, Clone)]
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; send errors just mean nobody is listening
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent::ScanDone {
            job_id: Uuid::nil(),
            status: JobStatus::Completed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scan:done");
        assert_eq!(json["data"]["status"], "completed");
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = ProgressBus::new();
        let mut rx = bus.subscribe();

        bus.publish(ProgressEvent::OrganizeDone {
            job_id: Uuid::nil(),
            status: JobStatus::Failed,
        });

        match rx.recv().await.unwrap() {
            ProgressEvent::OrganizeDone { status, .. } => {
                assert_eq!(status, JobStatus::Failed);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = ProgressBus::new();
        bus.publish(ProgressEvent::ScanDone {
            job_id: Uuid::nil(),
            status: JobStatus::Completed,
        });
    }
}
