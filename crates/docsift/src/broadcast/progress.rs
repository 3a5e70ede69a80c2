use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{BatchStatus, DocumentStatus, ResultsSummary};

/// What happened. Serialised with a `kind` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressKind {
    DocumentStarted {
        document_id: i64,
        filename: String,
    },
    DocumentFinished {
        document_id: i64,
        status: DocumentStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    BatchStarted {
        total: i64,
    },
    BatchProgress {
        completed: i64,
        failed: i64,
        processing: i64,
        progress: f64,
    },
    BatchFinished {
        status: BatchStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<ResultsSummary>,
    },
}

/// Progress event with its batch linkage and timestamp. Every key, the
/// flattened kind fields included, is snake_case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

impl ProgressEvent {
    pub fn new(batch_id: Option<&str>, kind: ProgressKind) -> Self {
        Self {
            batch_id: batch_id.map(str::to_string),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn for_batch(batch_id: &str, kind: ProgressKind) -> Self {
        Self::new(Some(batch_id), kind)
    }
}

/// Broadcasts progress events for streaming.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: ProgressEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
