//! Screening configuration store.
//!
//! A config is addressed by its `stable_id`, which never changes. Object
//! types can be added to a config but never removed, and every table a
//! config covers must be screenable.

use std::collections::BTreeSet;

use chrono::Utc;
use vigil_core::entities::{NewScreeningConfig, ScreeningConfig, ScreeningConfigUpdate};
use vigil_core::mapping::validate_table;
use vigil_core::ports::Credentials;
use vigil_db::repos::configs;

use crate::ScreeningService;
use crate::error::{ScreeningError, bad_parameter, not_found};

const MAX_THRESHOLD: u32 = 100;

impl ScreeningService {
    /// # Errors
    ///
    /// `Forbidden` without the feature or write permission, `BadParameter`
    /// for invalid fields or unscreenable tables, `NotFound` for unknown
    /// tables.
    pub async fn create_config(
        &self,
        creds: &Credentials,
        input: NewScreeningConfig,
    ) -> Result<ScreeningConfig, ScreeningError> {
        self.access().check_feature(creds)?;
        self.access().can_write_config(creds, &input.org_id)?;

        let now = Utc::now();
        let config = ScreeningConfig {
            id: vigil_core::new_id(),
            stable_id: vigil_core::new_id(),
            org_id: input.org_id,
            name: input.name.trim().to_string(),
            description: input.description,
            object_types: dedup(input.object_types),
            algorithm: input.algorithm,
            datasets: input.datasets,
            match_threshold: input.match_threshold,
            match_limit: input.match_limit,
            inbox_id: input.inbox_id,
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        self.validate_config(&config).await?;
        self.validate_object_types(&config.org_id, &config.object_types).await?;

        self.db.provision_org(&config.org_id).await?;
        {
            let conn = self.db.control().await;
            configs::insert(&conn, &config).await?;
        }
        tracing::info!(
            org_id = %config.org_id,
            stable_id = %config.stable_id,
            object_types = ?config.object_types,
            "screening config created"
        );
        Ok(config)
    }

    /// # Errors
    ///
    /// `NotFound` if no config has this stable id.
    pub async fn get_config_by_stable_id(
        &self,
        creds: &Credentials,
        stable_id: &str,
    ) -> Result<ScreeningConfig, ScreeningError> {
        self.access().check_feature(creds)?;
        self.load_config_for(creds, stable_id).await
    }

    /// Configs of the caller's organization.
    ///
    /// # Errors
    ///
    /// `Forbidden` without the feature.
    pub async fn list_configs(&self, creds: &Credentials) -> Result<Vec<ScreeningConfig>, ScreeningError> {
        self.access().check_feature(creds)?;
        let conn = self.db.control().await;
        Ok(configs::list_by_org(&conn, &creds.org_id).await?)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// `BadParameter` if an object type would be removed or a field is
    /// invalid, plus the errors of [`Self::create_config`].
    pub async fn update_config(
        &self,
        creds: &Credentials,
        stable_id: &str,
        update: ScreeningConfigUpdate,
    ) -> Result<ScreeningConfig, ScreeningError> {
        self.access().check_feature(creds)?;
        let mut config = self.load_config_for(creds, stable_id).await?;
        self.access().can_write_config(creds, &config.org_id)?;

        let mut added = Vec::new();
        if let Some(object_types) = update.object_types {
            let object_types = dedup(object_types);
            let removed: Vec<&String> = config
                .object_types
                .iter()
                .filter(|t| !object_types.contains(t))
                .collect();
            if !removed.is_empty() {
                return Err(bad_parameter(format!(
                    "object types can only be added to a config, missing: {removed:?}"
                )));
            }
            added = object_types
                .iter()
                .filter(|t| !config.covers(t))
                .cloned()
                .collect();
            config.object_types = object_types;
        }
        if let Some(name) = update.name {
            config.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            config.description = description;
        }
        if let Some(algorithm) = update.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(datasets) = update.datasets {
            config.datasets = datasets;
        }
        if let Some(threshold) = update.match_threshold {
            config.match_threshold = threshold;
        }
        if let Some(limit) = update.match_limit {
            config.match_limit = limit;
        }
        if let Some(inbox_id) = update.inbox_id {
            config.inbox_id = inbox_id;
        }
        if let Some(enabled) = update.enabled {
            config.enabled = enabled;
        }
        config.updated_at = Utc::now();

        self.validate_config(&config).await?;
        self.validate_object_types(&config.org_id, &added).await?;

        if !added.is_empty() {
            self.db.provision_org(&config.org_id).await?;
        }
        {
            let conn = self.db.control().await;
            configs::update(&conn, &config).await?;
        }
        tracing::info!(stable_id, added = ?added, "screening config updated");
        Ok(config)
    }

    /// Enabled configs of an organization that cover `object_type`.
    ///
    /// # Errors
    ///
    /// Returns a database error if the lookup fails.
    pub async fn enabled_configs_for(
        &self,
        org_id: &str,
        object_type: &str,
    ) -> Result<Vec<ScreeningConfig>, ScreeningError> {
        let conn = self.db.control().await;
        Ok(configs::list_enabled_for_object_type(&conn, org_id, object_type).await?)
    }

    pub(crate) async fn load_config(&self, stable_id: &str) -> Result<ScreeningConfig, ScreeningError> {
        let conn = self.db.control().await;
        configs::get_by_stable_id(&conn, stable_id)
            .await?
            .ok_or_else(|| not_found("screening config", stable_id))
    }

    /// Config of the caller's organization; others' configs are reported as
    /// missing.
    pub(crate) async fn load_config_for(
        &self,
        creds: &Credentials,
        stable_id: &str,
    ) -> Result<ScreeningConfig, ScreeningError> {
        let config = self.load_config(stable_id).await?;
        if config.org_id != creds.org_id {
            return Err(not_found("screening config", stable_id));
        }
        Ok(config)
    }

    async fn validate_config(&self, config: &ScreeningConfig) -> Result<(), ScreeningError> {
        if config.name.is_empty() {
            return Err(bad_parameter("config name must not be empty"));
        }
        if config.inbox_id.trim().is_empty() {
            return Err(bad_parameter("config must have an inbox"));
        }
        if config.object_types.is_empty() {
            return Err(bad_parameter("config must cover at least one object type"));
        }
        if config.datasets.is_empty() {
            return Err(bad_parameter("config must screen against at least one dataset"));
        }
        if config.match_threshold > MAX_THRESHOLD {
            return Err(bad_parameter(format!(
                "match threshold must be between 0 and {MAX_THRESHOLD}, got {}",
                config.match_threshold
            )));
        }
        if config.match_limit == 0 {
            return Err(bad_parameter("match limit must be at least 1"));
        }

        if self.provider.is_configured() {
            let algorithms = self.provider.algorithms().await?;
            if !algorithms.iter().any(|a| a.name == config.algorithm) {
                return Err(bad_parameter(format!(
                    "unknown matching algorithm '{}'",
                    config.algorithm
                )));
            }
        }
        Ok(())
    }

    async fn validate_object_types(
        &self,
        org_id: &str,
        object_types: &[String],
    ) -> Result<(), ScreeningError> {
        if object_types.is_empty() {
            return Ok(());
        }
        let model = self.collaborators.data_model.get_data_model(org_id).await?;
        for object_type in object_types {
            let table = model
                .table(object_type)
                .ok_or_else(|| not_found("table", object_type))?;
            validate_table(table)?;
        }
        Ok(())
    }
}

/// Drop repeated entries, keeping first-seen order.
fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dedup_keeps_order() {
        assert_eq!(
            dedup(vec!["b".into(), "a".into(), "b".into()]),
            vec!["b".to_string(), "a".to_string()]
        );
    }
}
