//! Notification spool: one JSON document per line for an external renderer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pullci_core::notify::{Notification, Notifier};
use pullci_core::{Error, Repository, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A spooled notification, as written to the file.
#[derive(Debug, Serialize)]
struct SpoolEntry<'a> {
    timestamp: DateTime<Utc>,
    recipients: &'a [String],
    #[serde(flatten)]
    notification: &'a Notification,
    fields: BTreeMap<String, String>,
}

/// Appends notifications to a spool file, or logs them when there is none.
pub struct SpoolNotifier {
    path: Option<PathBuf>,
}

impl SpoolNotifier {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Notifier for SpoolNotifier {
    async fn notify(&self, repo: &Repository, notification: &Notification) -> Result<()> {
        let kind = notification.kind();
        if !repo.wants(kind) {
            debug!(repo = %repo.key, event = %kind, "Event filtered out by repository settings");
            return Ok(());
        }

        let Some(path) = &self.path else {
            info!(
                repo = %repo.key,
                pull = notification.pull(),
                event = %kind,
                "Notification"
            );
            return Ok(());
        };

        let entry = SpoolEntry {
            timestamp: Utc::now(),
            recipients: &repo.cron.recipients,
            notification,
            fields: notification.fields(),
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| Error::Notify(format!("failed to serialize notification: {}", e)))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| Error::Notify(format!("failed to open {}: {}", path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Notify(format!("failed to write {}: {}", path.display(), e)))?;
        // tokio completes file writes on a blocking thread; flush waits for it.
        file.flush()
            .await
            .map_err(|e| Error::Notify(format!("failed to flush {}: {}", path.display(), e)))?;

        debug!(repo = %repo.key, event = %kind, path = %path.display(), "Spooled notification");
        Ok(())
    }
}
