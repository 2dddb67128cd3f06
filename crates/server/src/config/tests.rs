use std::time::Duration;

use super::*;

#[test]
fn empty_file_gives_in_memory_defaults() {
    let config: VanishConfig = toml::from_str("").unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.max_upload_bytes, 100 * 1024 * 1024);
    assert_eq!(config.blob.backend, "memory");
    assert_eq!(config.blob.namespace, "vanish");
    assert_eq!(config.metadata.backend, "memory");
    assert_eq!(config.reaper.interval_seconds, 60);
    assert!(!config.reaper.run_on_start);
    assert_eq!(config.telemetry.level, "info");
    assert!(!config.telemetry.json);
}

#[test]
fn default_lifecycle_section_is_valid() {
    let config: VanishConfig = toml::from_str("").unwrap();
    let lifecycle = config.lifecycle.to_lifecycle_config();
    lifecycle.validate().unwrap();
    assert_eq!(lifecycle.ttl.default, Duration::from_secs(3600));
    assert_eq!(lifecycle.ttl.max, Duration::from_secs(604_800));
    assert!(lifecycle.enforce_expiry_on_read);
}

#[test]
fn lifecycle_section_overrides() {
    let toml = r#"
        [lifecycle]
        default_ttl_seconds = 120
        min_ttl_seconds = 10
        max_ttl_seconds = 600
        store_timeout_seconds = 3
        enforce_expiry_on_read = false
        reclaim_page_size = 50

        [reaper]
        interval_seconds = 15
        run_on_start = true
    "#;

    let config: VanishConfig = toml::from_str(toml).unwrap();
    let lifecycle = config.lifecycle.to_lifecycle_config();
    assert_eq!(lifecycle.ttl.min, Duration::from_secs(10));
    assert_eq!(lifecycle.ttl.default, Duration::from_secs(120));
    assert_eq!(lifecycle.store_timeout, Duration::from_secs(3));
    assert_eq!(lifecycle.transfer_timeout, Duration::from_secs(300));
    assert!(!lifecycle.enforce_expiry_on_read);
    assert_eq!(lifecycle.reclaim_page_size, 50);

    let reaper = config.reaper.to_reaper_config();
    assert_eq!(reaper.interval, Duration::from_secs(15));
    assert!(reaper.run_on_start);
}

#[test]
fn zero_interval_is_raised_to_one_second() {
    let config: ReaperServerConfig = toml::from_str("interval_seconds = 0").unwrap();
    assert_eq!(config.to_reaper_config().interval, Duration::from_secs(1));
}

#[test]
fn storage_sections() {
    let toml = r#"
        [blob]
        backend = "s3"
        namespace = "uploads"
        region = "eu-west-1"
        endpoint_url = "http://localhost:9000"

        [metadata]
        backend = "postgres"
        url = "postgres://localhost/vanish"
        pool_size = 12
    "#;

    let config: VanishConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.blob.backend, "s3");
    assert_eq!(config.blob.namespace, "uploads");
    assert_eq!(config.blob.region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.blob.path, "./data");
    assert_eq!(config.metadata.backend, "postgres");
    assert_eq!(config.metadata.pool_size, Some(12));
    assert!(config.metadata.schema.is_none());
}

#[test]
fn telemetry_json_output() {
    let config: TelemetryConfig = toml::from_str("json = true").unwrap();
    assert!(config.json);
    assert_eq!(config.level, "info");
}
