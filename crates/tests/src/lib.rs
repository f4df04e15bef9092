//! # Integration Tests
//!
//! End-to-end scenarios for the receiver.
//!
//! Covers:
//! - Standalone ingestion: materialization, ordering, NaN and unmatched points
//! - Cluster routing: forwarding, unready owners, hop limits, replication
//! - Overrun: slow storage, queue growth and recovery, shutdown accounting

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use director::DirectorConfig;

    #[test]
    fn test_blueprint_drives_director_config() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[receiver]
channel_capacity = 8
flush_threshold = 32
rebalance_timeout_secs = 3
report_interval_ms = 250

[[series]]
pattern = "^host\\."
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let config = DirectorConfig::from_receiver(&blueprint.receiver);
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.flush_threshold, 32);
        assert_eq!(config.rebalance_timeout.as_secs(), 3);
        assert_eq!(config.report_interval.as_millis(), 250);
    }
}

#[cfg(test)]
mod e2e_tests;

#[cfg(test)]
mod cluster_tests;

#[cfg(test)]
mod overrun_tests;
