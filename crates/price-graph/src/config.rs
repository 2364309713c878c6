//! Engine configuration: anchor tokens and pair, env vars, TOML files.

use std::env;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{EngineError, PairAddress, TokenId};

const DEFAULT_REFERENCE_DECIMALS: u32 = 18;

/// Anchor configuration for a price-derivation engine. The reference token's
/// derived price is defined as exactly 1; the anchor pair (reference/fiat)
/// supplies the USD conversion and must exist in every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub reference_token: TokenId,
    pub fiat_token: TokenId,
    pub anchor_pair: PairAddress,
    pub reference_decimals: u32,
}

/// Optional-field mirror of [`EngineConfig`] for TOML files; environment
/// variables override file values.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub reference_token: Option<String>,
    pub fiat_token: Option<String>,
    pub anchor_pair: Option<String>,
    pub reference_decimals: Option<u32>,
}

impl EngineConfig {
    pub fn new(
        reference_token: impl Into<TokenId>,
        fiat_token: impl Into<TokenId>,
        anchor_pair: impl Into<PairAddress>,
        reference_decimals: u32,
    ) -> Self {
        Self {
            reference_token: reference_token.into(),
            fiat_token: fiat_token.into(),
            anchor_pair: anchor_pair.into(),
            reference_decimals,
        }
    }

    /// Load from environment variables only: `REFERENCE_TOKEN`, `FIAT_TOKEN`,
    /// `ANCHOR_PAIR`, `REFERENCE_DECIMALS`.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_parts(FileConfig::default())
    }

    /// Load from a TOML file, with environment variables taking precedence.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let file: FileConfig =
            toml::from_str(&contents).with_context(|| format!("parsing config file {path}"))?;
        let config = Self::from_parts(file)?;
        info!(
            reference = %config.reference_token,
            fiat = %config.fiat_token,
            anchor_pair = %config.anchor_pair,
            "loaded engine config from {path}"
        );
        Ok(config)
    }

    fn from_parts(file: FileConfig) -> anyhow::Result<Self> {
        let reference_token = env::var("REFERENCE_TOKEN")
            .ok()
            .or(file.reference_token)
            .context("reference_token is required (REFERENCE_TOKEN)")?;
        let fiat_token = env::var("FIAT_TOKEN")
            .ok()
            .or(file.fiat_token)
            .context("fiat_token is required (FIAT_TOKEN)")?;
        let anchor_pair = env::var("ANCHOR_PAIR")
            .ok()
            .or(file.anchor_pair)
            .context("anchor_pair is required (ANCHOR_PAIR)")?;
        let reference_decimals = env::var("REFERENCE_DECIMALS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(file.reference_decimals)
            .unwrap_or(DEFAULT_REFERENCE_DECIMALS);

        let config = Self {
            reference_token: TokenId(reference_token),
            fiat_token: TokenId(fiat_token),
            anchor_pair: PairAddress(anchor_pair),
            reference_decimals,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot yield a coherent price basis.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.reference_token == self.fiat_token {
            return Err(EngineError::Config(
                "reference token and fiat anchor token must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_reference_and_fiat_token_is_rejected() {
        let config = EngineConfig::new("WEGLD", "WEGLD", "erd1pair", 18);
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_distinct_anchors_validate() {
        let config = EngineConfig::new("WEGLD", "USDC", "erd1pair", 18);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_values_load_when_env_is_unset() {
        let path = std::env::temp_dir().join("price-graph-config-test.toml");
        std::fs::write(
            &path,
            "reference_token = \"WEGLD\"\nfiat_token = \"USDC\"\nanchor_pair = \"erd1anchor\"\nreference_decimals = 18\n",
        )
        .unwrap();
        let config = EngineConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.reference_token, TokenId::from("WEGLD"));
        assert_eq!(config.anchor_pair, PairAddress::from("erd1anchor"));
        assert_eq!(config.reference_decimals, 18);
    }

    #[test]
    fn test_missing_file_reports_the_path() {
        let err = EngineConfig::from_file("/nonexistent/engine.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.toml"));
    }
}
