use scatter_core::types::{Platform, ProviderConfigRecord};
use scatter_core::{Result, ScatterError};

use crate::discord::{DiscordConfig, DiscordProvider};
use crate::local::{LocalConfig, LocalProvider};
use crate::provider::StorageProvider;

/// Construct a provider from its stored configuration record.
///
/// The platform identifier selects the implementation; adding a platform
/// means adding an arm here and an implementation of the trait, nothing
/// more.
pub fn build_provider(record: &ProviderConfigRecord) -> Result<Box<dyn StorageProvider>> {
    let config_err =
        |e: String| ScatterError::Config(format!("provider '{}': {e}", record.name));

    match record.platform {
        Platform::Discord => {
            let cfg: DiscordConfig = serde_json::from_value(record.config.clone())
                .map_err(|e| config_err(e.to_string()))?;
            let provider = DiscordProvider::new(cfg).map_err(|e| config_err(e.to_string()))?;
            Ok(Box::new(provider))
        }
        Platform::Local => {
            let cfg: LocalConfig = serde_json::from_value(record.config.clone())
                .map_err(|e| config_err(e.to_string()))?;
            let provider = LocalProvider::new(cfg).map_err(|e| config_err(e.to_string()))?;
            Ok(Box::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(platform: Platform, config: serde_json::Value) -> ProviderConfigRecord {
        ProviderConfigRecord {
            id: 1,
            name: "test".into(),
            platform,
            config,
            created_at: "2026-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn builds_local_provider() {
        let tmp = tempfile::TempDir::new().unwrap();
        let rec = record(
            Platform::Local,
            serde_json::json!({"base_path": tmp.path()}),
        );
        let provider = build_provider(&rec).unwrap();
        assert_eq!(provider.platform(), Platform::Local);
    }

    #[test]
    fn builds_discord_provider() {
        let rec = record(
            Platform::Discord,
            serde_json::json!({"bot_token": "t", "channel_id": "123"}),
        );
        let provider = build_provider(&rec).unwrap();
        assert_eq!(provider.platform(), Platform::Discord);
        assert_eq!(provider.max_chunk_size(), crate::discord::DEFAULT_MAX_CHUNK_SIZE);
    }

    #[test]
    fn missing_fields_are_config_errors() {
        let rec = record(Platform::Discord, serde_json::json!({"bot_token": "t"}));
        let err = build_provider(&rec).unwrap_err();
        assert!(matches!(err, ScatterError::Config(_)));
    }
}
