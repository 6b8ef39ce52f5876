//! Demo access log
//!
//! One document per demo login, logout or forced reset.

use tracing::debug;
use vox_core::{AccessAction, AccessLogEntry, ChangeId};

use crate::config::DemoConfig;
use crate::error::DemoResult;
use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AccessLog {
    gateway: Gateway,
    database_id: String,
    collection: String,
    client_label: String,
}

impl AccessLog {
    pub fn new(gateway: Gateway, config: &DemoConfig) -> Self {
        Self {
            gateway,
            database_id: config.database_id.clone(),
            collection: config.access_log_collection.clone(),
            client_label: config.client_label.clone(),
        }
    }

    /// Write one entry for `email`
    pub async fn record(&self, email: &str, action: AccessAction) -> DemoResult<()> {
        let entry = AccessLogEntry::new(email, action, self.client_label.clone());
        let id = ChangeId::generate();
        self.gateway
            .create_document(&self.database_id, &self.collection, id.as_str(), entry.to_fields())
            .await?;
        debug!(email = %email, action = %action, "Access logged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Platform;
    use crate::throttle::Throttle;
    use std::sync::Arc;
    use vox_backend::MemoryBackend;
    use vox_core::DEMO_EMAIL;

    #[tokio::test]
    async fn test_record_writes_entry() {
        let backend = Arc::new(MemoryBackend::new());
        let config = DemoConfig::test();
        let log = AccessLog::new(
            Gateway::new(
                Platform::from_backend(backend.clone()),
                Arc::new(Throttle::unlimited()),
            ),
            &config,
        );

        log.record(DEMO_EMAIL, AccessAction::Login).await.unwrap();
        log.record(DEMO_EMAIL, AccessAction::Logout).await.unwrap();

        let docs = backend
            .documents(&config.database_id, &config.access_log_collection)
            .await;
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.get_str("email") == Some(DEMO_EMAIL)));
        assert!(docs.iter().any(|d| d.get_str("action") == Some("logout")));
    }
}
