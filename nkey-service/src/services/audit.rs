use std::sync::Arc;
use tokio::task::JoinHandle;

use super::store::CredentialStore;
use crate::models::AuditRecord;

/// Appends an audit record. Failures are logged and never fail the caller's
/// operation.
pub async fn record(store: &dyn CredentialStore, record: AuditRecord) {
    if let Err(e) = store.append_audit(&record).await {
        tracing::warn!(
            error = %e,
            action = record.action.as_str(),
            target_id = %record.target_id,
            "Failed to write audit record"
        );
    }
}

/// Same as [`record`] on a detached task.
pub fn record_detached(store: Arc<dyn CredentialStore>, entry: AuditRecord) -> JoinHandle<()> {
    tokio::spawn(async move { record(store.as_ref(), entry).await })
}
