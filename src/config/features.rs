//! Typed per-tenant feature configuration, stored as JSONB on the registry row.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Only this layout version is understood; bump when recognized keys change.
pub const FEATURES_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TenantFeatures {
    pub version: u32,
    #[serde(default)]
    pub marketplace: MarketplaceFeatures,
    /// ERP modules enabled for the tenant (e.g. `production`, `inventory`).
    #[serde(default)]
    pub modules: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MarketplaceFeatures {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storefront_domain: Option<String>,
}

impl Default for TenantFeatures {
    fn default() -> Self {
        TenantFeatures {
            version: FEATURES_VERSION,
            marketplace: MarketplaceFeatures::default(),
            modules: Vec::new(),
        }
    }
}

impl TenantFeatures {
    /// Parse the stored JSON. `null` means defaults; unknown keys or versions are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(TenantFeatures::default());
        }
        let features: TenantFeatures =
            serde_json::from_value(value.clone()).map_err(|e| ConfigError::Features(e.to_string()))?;
        if features.version != FEATURES_VERSION {
            return Err(ConfigError::Features(format!(
                "unsupported version {} (expected {})",
                features.version, FEATURES_VERSION
            )));
        }
        Ok(features)
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m.eq_ignore_ascii_case(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_recognized_keys() {
        let features = TenantFeatures::from_json(&json!({
            "version": 1,
            "marketplace": { "enabled": true, "storefrontDomain": "shop.topsteel.fr" },
            "modules": ["production", "inventory"]
        }))
        .unwrap();
        assert!(features.marketplace.enabled);
        assert_eq!(features.marketplace.storefront_domain.as_deref(), Some("shop.topsteel.fr"));
        assert!(features.has_module("Inventory"));
    }

    #[test]
    fn null_means_defaults() {
        assert_eq!(TenantFeatures::from_json(&serde_json::Value::Null).unwrap(), TenantFeatures::default());
    }

    #[test]
    fn misspelled_key_is_rejected() {
        let err = TenantFeatures::from_json(&json!({
            "version": 1,
            "marketplace": { "enable": true }
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Features(_)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(TenantFeatures::from_json(&json!({ "version": 2 })).is_err());
    }
}
