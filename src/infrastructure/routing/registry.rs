//! Name to adapter lookup

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::domain::{DomainError, LlmProvider};

/// Registered provider adapters, keyed by name
///
/// Registration normally happens once at startup, but the table sits behind a
/// lock so adapters can be added while requests are in flight.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`; an existing entry is never replaced
    pub async fn register(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<(), DomainError> {
        let name = name.into();
        let mut providers = self.providers.write().await;

        if providers.contains_key(&name) {
            return Err(DomainError::duplicate_provider(name));
        }

        info!(provider = %name, "Registered provider");
        providers.insert(name, provider);
        Ok(())
    }

    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn LlmProvider>, DomainError> {
        self.providers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::unknown_provider(name))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.providers.read().await.contains_key(name)
    }

    /// Registered names in sorted order
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.providers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.providers.read().await.is_empty()
    }
}
