//! Configuration parsing
//!
//! TOML (primary) and JSON formats.

use contracts::{ContractError, ReceiverBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<ReceiverBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<ReceiverBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse according to `format`
pub fn parse(content: &str, format: ConfigFormat) -> Result<ReceiverBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ConsolidationFn;

    #[test]
    fn test_parse_toml_applies_defaults() {
        let content = r#"
[[series]]
pattern = "^host\\."
"#;
        let bp = parse_toml(content).unwrap();
        assert!(!bp.is_clustered());
        assert_eq!(bp.receiver.listen_addr, "0.0.0.0:2003");
        assert_eq!(bp.receiver.flush_threshold, 256);
        assert_eq!(bp.series[0].step_secs, 10);
        assert_eq!(bp.series[0].heartbeat_secs, 120);
        assert!(bp.series[0].archives.is_empty());
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[receiver]
listen_addr = "127.0.0.1:2003"
channel_capacity = 64

[cluster]
local_node = "a"
replication = 2
[[cluster.nodes]]
name = "a"
addr = "10.0.0.1:7946"
[[cluster.nodes]]
name = "b"
addr = "10.0.0.2:7946"

[[series]]
pattern = ".*"
step_secs = 60
heartbeat_secs = 300
[[series.archives]]
function = "max"
step_secs = 3600
rows = 24
"#;
        let bp = parse_toml(content).unwrap();
        let cluster = bp.cluster.as_ref().unwrap();
        assert_eq!(cluster.replication, 2);
        assert_eq!(cluster.nodes[1].addr, "10.0.0.2:7946");
        assert_eq!(bp.receiver.channel_capacity, 64);
        assert_eq!(bp.series[0].archives[0].function, ConsolidationFn::Max);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "receiver": { "flush_threshold": 10 },
            "series": [{ "pattern": "^db\\.", "archives": [
                { "function": "average", "step_secs": 60, "rows": 10 }
            ] }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.receiver.flush_threshold, 10);
        assert_eq!(bp.series[0].archives[0].rows, 10);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
