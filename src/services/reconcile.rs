use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::FileRecord;
use crate::services::file::storage_key_millis;
use crate::services::MetadataStore;
use crate::storage::BlobStore;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub delete_orphans: bool,
    pub prune_dangling: bool,
    /// Blobs younger than this may belong to an upload still in flight
    pub grace: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            delete_orphans: false,
            prune_dangling: false,
            grace: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    pub container: String,
    pub orphaned_blobs: Vec<String>,
    pub dangling_records: Vec<FileRecord>,
    /// Unmatched blobs inside the grace period
    pub recent_blobs: Vec<String>,
    /// Unmatched blobs whose keys this service did not generate
    pub foreign_blobs: Vec<String>,
    pub deleted_blobs: usize,
    pub pruned_records: usize,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_blobs.is_empty() && self.dangling_records.is_empty()
    }
}

/// Out-of-band sweep comparing the blob store with the metadata store
pub struct Reconciler {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    container: String,
}

impl Reconciler {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            metadata,
            container: container.into(),
        }
    }

    pub async fn sweep(&self, options: &ReconcileOptions) -> Result<ReconcileReport> {
        // Records are listed before blobs: an upload landing between the two
        // listings then shows up as a recent blob, never as a dangling record.
        let records = self.metadata.list_by_container(&self.container).await?;
        let blob_keys: HashSet<String> = self.blobs.list(&self.container).await?.into_iter().collect();
        let record_keys: HashSet<&str> = records.iter().map(|r| r.storage_key.as_str()).collect();

        let mut report = ReconcileReport {
            container: self.container.clone(),
            ..ReconcileReport::default()
        };

        let cutoff = Utc::now().timestamp_millis() - options.grace.as_millis() as i64;
        let mut unmatched: Vec<&String> = blob_keys
            .iter()
            .filter(|k| !record_keys.contains(k.as_str()))
            .collect();
        unmatched.sort();

        for key in unmatched {
            match storage_key_millis(key) {
                Some(millis) if millis > cutoff => report.recent_blobs.push(key.clone()),
                Some(_) => report.orphaned_blobs.push(key.clone()),
                None => report.foreign_blobs.push(key.clone()),
            }
        }

        report.dangling_records = records
            .into_iter()
            .filter(|r| !blob_keys.contains(&r.storage_key))
            .collect();

        tracing::info!(
            container = %self.container,
            orphaned = report.orphaned_blobs.len(),
            dangling = report.dangling_records.len(),
            recent = report.recent_blobs.len(),
            foreign = report.foreign_blobs.len(),
            "Reconciliation sweep finished"
        );

        if options.delete_orphans {
            for key in &report.orphaned_blobs {
                match self.blobs.delete(&self.container, key).await {
                    Ok(()) => report.deleted_blobs += 1,
                    Err(e) => tracing::warn!(key = %key, "Failed to delete orphaned blob: {}", e),
                }
            }
        }

        if options.prune_dangling {
            for record in &report.dangling_records {
                match self.metadata.delete_by_id(record.id).await {
                    Ok(true) => report.pruned_records += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(id = record.id, "Failed to prune dangling record: {}", e)
                    }
                }
            }
        }

        Ok(report)
    }
}
