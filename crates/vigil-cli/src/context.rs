//! Wiring of the configured stack.

use std::sync::Arc;

use anyhow::Context;
use vigil_config::VigilConfig;
use vigil_core::ports::SystemAccess;
use vigil_dataset::BlobStore;
use vigil_db::VigilDb;
use vigil_provider::{HttpScreeningProvider, ScreeningProvider};
use vigil_screening::{Collaborators, ScreeningService};
use vigil_worker::{InMemoryQueue, QueueEnrichment, Worker, WorkerSettings};

pub struct AppContext {
    pub provider: Arc<dyn ScreeningProvider>,
    pub queue: Arc<InMemoryQueue>,
    pub worker: Worker,
}

impl AppContext {
    pub async fn init(config: VigilConfig) -> anyhow::Result<Self> {
        let db = Arc::new(
            VigilDb::open(&config.database)
                .await
                .context("failed to open vigil databases")?,
        );
        let provider: Arc<dyn ScreeningProvider> = Arc::new(
            HttpScreeningProvider::new(&config.provider)
                .context("failed to build screening provider client")?,
        );
        let store = BlobStore::local(&config.storage.root)
            .with_context(|| format!("failed to open blob store at {}", config.storage.root))?;

        let queue = Arc::new(InMemoryQueue::new());
        let enrichment = Arc::new(QueueEnrichment::new(queue.clone()));
        let collaborators = Collaborators::database_backed(&db, Arc::new(SystemAccess), enrichment);
        let service = Arc::new(ScreeningService::new(db, Arc::clone(&provider), collaborators));
        let settings = WorkerSettings {
            worker: config.worker,
            storage: config.storage,
            general: config.general,
        };
        let worker = Worker::new(service, queue.clone(), store, settings);

        Ok(Self {
            provider,
            queue,
            worker,
        })
    }

    /// Run whatever the last command queued.
    pub async fn drain(&self) -> anyhow::Result<usize> {
        let ran = self.worker.drain(&self.queue).await?;
        tracing::info!(jobs = ran, "follow-up jobs done");
        Ok(ran)
    }
}

/// Emit warnings for likely mistyped env var keys that silently fell back to defaults.
pub fn warn_unconfigured(config: &VigilConfig) {
    for warning in collect_unconfigured_warnings(config, std::env::vars()) {
        tracing::warn!("{warning}");
    }
}

fn collect_unconfigured_warnings<I>(config: &VigilConfig, env: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let env_keys = env.into_iter().map(|(key, _)| key).collect::<Vec<_>>();
    let mut warnings = Vec::new();

    if !config.provider.is_configured() && has_env_prefix(&env_keys, "VIGIL_PROVIDER") {
        warnings.push(
            "Provider config appears default while VIGIL_PROVIDER* env vars exist. Use double underscores (example: VIGIL_PROVIDER__URL)."
                .to_string(),
        );
    }
    if config.storage.public_url.is_empty() {
        warnings.push(
            "storage.public_url is empty; exported catalog URLs will be relative.".to_string(),
        );
    }
    warnings
}

fn has_env_prefix(keys: &[String], prefix: &str) -> bool {
    keys.iter().any(|key| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn single_underscore_provider_key_is_reported() {
        let mut config = VigilConfig::default();
        config.storage.public_url = "https://files.test".into();
        let warnings =
            collect_unconfigured_warnings(&config, env(&[("VIGIL_PROVIDER_URL", "https://x")]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("VIGIL_PROVIDER__URL"));
    }

    #[test]
    fn configured_stack_has_no_warnings() {
        let mut config = VigilConfig::default();
        config.provider.url = "https://yente.test".into();
        config.storage.public_url = "https://files.test".into();
        let warnings =
            collect_unconfigured_warnings(&config, env(&[("VIGIL_PROVIDER__URL", "https://yente.test")]));
        assert!(warnings.is_empty());
    }
}
