//! Integration tests for TOML and environment configuration loading.
//!
//! Uses figment::Jail for sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use vigil_config::VigilConfig;

#[test]
fn loads_provider_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[provider]
url = "http://yente.internal:8000"
api_key = ""
self_hosted = true
timeout_secs = 10
"#,
        )?;

        let config: VigilConfig = Figment::from(Serialized::defaults(VigilConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.provider.url, "http://yente.internal:8000");
        assert!(config.provider.self_hosted);
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.provider.default_algorithm, "logic-v1");
        assert!(config.provider.is_configured());
        Ok(())
    });
}

#[test]
fn loads_worker_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r"
[worker]
download_concurrency = 5
dataset_page_size = 250
",
        )?;

        let config: VigilConfig = Figment::from(Serialized::defaults(VigilConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.worker.download_concurrency, 5);
        assert_eq!(config.worker.dataset_page_size, 250);
        assert_eq!(config.worker.max_exported_deltas, 30);
        Ok(())
    });
}

#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[storage]
public_url = "https://from-toml.example.com"
"#,
        )?;
        jail.set_env("VIGIL_STORAGE__PUBLIC_URL", "https://from-env.example.com");

        let config: VigilConfig = Figment::from(Serialized::defaults(VigilConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()?;

        assert_eq!(config.storage.public_url, "https://from-env.example.com");
        Ok(())
    });
}

#[test]
fn project_file_is_picked_up_by_load() {
    Jail::expect_with(|jail| {
        jail.create_dir(".vigil")?;
        jail.create_file(
            ".vigil/config.toml",
            r#"
[general]
dataset_prefix = "acme_"
"#,
        )?;

        let config = VigilConfig::load().expect("config loads");
        assert_eq!(config.general.dataset_prefix, "acme_");
        Ok(())
    });
}

#[test]
fn load_rejects_zero_page_size() {
    Jail::expect_with(|jail| {
        jail.set_env("VIGIL_WORKER__DATASET_PAGE_SIZE", "0");
        assert!(VigilConfig::load().is_err());
        Ok(())
    });
}
