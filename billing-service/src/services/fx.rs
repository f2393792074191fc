//! FX provider: supported-currency catalog and per-currency metadata.

use crate::models::CurrencyMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("fx provider unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// Catalog of supported currencies and their metadata.
///
/// `now` is part of both operations so providers may serve time-varying
/// catalogs. `currency_metadata` returns a zero-filled value for an unknown
/// code; callers are expected to confirm support via
/// `supported_currencies` first.
#[async_trait]
pub trait FxProvider: Send + Sync {
    async fn supported_currencies(&self, now: DateTime<Utc>) -> Result<Vec<String>, FxError>;

    async fn currency_metadata(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<CurrencyMetadata, FxError>;
}

/// Static in-process provider: USD and GEL, both with precision 2.
#[derive(Debug, Clone, Default)]
pub struct StaticFxProvider;

impl StaticFxProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FxProvider for StaticFxProvider {
    async fn supported_currencies(&self, _now: DateTime<Utc>) -> Result<Vec<String>, FxError> {
        Ok(vec!["USD".to_string(), "GEL".to_string()])
    }

    async fn currency_metadata(
        &self,
        code: &str,
        _now: DateTime<Utc>,
    ) -> Result<CurrencyMetadata, FxError> {
        let metadata = match code {
            "USD" => CurrencyMetadata {
                code: "USD".to_string(),
                symbol: "$".to_string(),
                precision: 2,
            },
            "GEL" => CurrencyMetadata {
                code: "GEL".to_string(),
                symbol: "\u{20be}".to_string(),
                precision: 2,
            },
            _ => CurrencyMetadata::default(),
        };
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_supports_usd_and_gel() {
        let fx = StaticFxProvider::new();
        let currencies = fx.supported_currencies(Utc::now()).await.unwrap();
        assert_eq!(currencies, vec!["USD", "GEL"]);

        let usd = fx.currency_metadata("USD", Utc::now()).await.unwrap();
        assert_eq!(usd.symbol, "$");
        assert_eq!(usd.precision, 2);
    }

    #[tokio::test]
    async fn unknown_code_yields_zero_filled_metadata() {
        let fx = StaticFxProvider::new();
        let jpy = fx.currency_metadata("JPY", Utc::now()).await.unwrap();
        assert_eq!(jpy.code, "");
        assert_eq!(jpy.precision, 0);
    }
}
