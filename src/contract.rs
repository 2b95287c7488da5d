use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::Category;
use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    Stock,
    Etf,
    Crypto,
    Future,
    Index,
}

impl InstrumentKind {
    fn routing_hint(&self) -> &'static str {
        match self {
            InstrumentKind::Stock | InstrumentKind::Etf | InstrumentKind::Index => "SMART",
            InstrumentKind::Crypto => "PAXOS",
            InstrumentKind::Future => "GLOBEX",
        }
    }

    fn quote_currency(&self) -> &'static str {
        match self {
            InstrumentKind::Crypto => "USD",
            _ => "USD",
        }
    }
}

/// Resolved instrument descriptor consulted by the Price Fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub kind: InstrumentKind,
    pub exchange: &'static str,
    pub currency: &'static str,
    pub ticker_variant: String,
}

impl ContractDescriptor {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "kind": self.kind,
            "exchange": self.exchange,
            "currency": self.currency,
            "ticker_variant": self.ticker_variant,
        })
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        serde_json::from_value::<StoredDescriptor>(value.clone())
            .ok()
            .map(|d| ContractDescriptor {
                kind: d.kind,
                exchange: exchange_static(d.kind),
                currency: "USD",
                ticker_variant: d.ticker_variant,
            })
    }
}

#[derive(Deserialize)]
struct StoredDescriptor {
    kind: InstrumentKind,
    ticker_variant: String,
}

fn exchange_static(kind: InstrumentKind) -> &'static str {
    InstrumentKind::routing_hint(&kind)
}

/// Classifies `(ticker, category)` into an instrument kind and routing
/// descriptor (§4.G), consulting the Store's cache before resolving fresh.
pub struct ContractResolver {
    overrides: HashMap<String, InstrumentKind>,
}

impl ContractResolver {
    pub fn new() -> Self {
        let mut overrides = HashMap::new();
        overrides.insert("MSTR".to_string(), InstrumentKind::Stock);
        overrides.insert("BTC-USD".to_string(), InstrumentKind::Crypto);
        overrides.insert("ETH-USD".to_string(), InstrumentKind::Crypto);
        Self { overrides }
    }

    pub fn with_overrides(overrides: HashMap<String, InstrumentKind>) -> Self {
        Self { overrides }
    }

    /// Resolves through the store's contract cache first, falling back to
    /// the override → category-default → symbol-pattern chain and caching
    /// the result.
    pub async fn resolve(
        &self,
        store: &dyn Store,
        ticker: &str,
        category: Category,
    ) -> Result<ContractDescriptor> {
        if let Some(cached) = store.get_contract(ticker, category).await? {
            if let Some(descriptor) = ContractDescriptor::from_json(&cached) {
                return Ok(descriptor);
            }
        }

        let descriptor = self.classify(ticker, category);
        store.cache_contract(ticker, category, descriptor.to_json()).await?;
        Ok(descriptor)
    }

    pub fn classify(&self, ticker: &str, category: Category) -> ContractDescriptor {
        let kind = self
            .overrides
            .get(ticker)
            .copied()
            .unwrap_or_else(|| self.category_default(category, ticker));

        ContractDescriptor {
            kind,
            exchange: kind.routing_hint(),
            currency: kind.quote_currency(),
            ticker_variant: ticker.to_string(),
        }
    }

    fn category_default(&self, category: Category, ticker: &str) -> InstrumentKind {
        match category {
            Category::Etfs => InstrumentKind::Etf,
            Category::Digitalassets => InstrumentKind::Crypto,
            Category::Daily | Category::Ideas => self.symbol_pattern_fallback(ticker),
        }
    }

    /// Last-resort heuristic when neither an override nor the category
    /// default applies.
    fn symbol_pattern_fallback(&self, ticker: &str) -> InstrumentKind {
        if ticker.ends_with("-USD") {
            InstrumentKind::Crypto
        } else if ticker.starts_with('/') {
            InstrumentKind::Future
        } else if ticker.len() <= 5 && ticker.chars().all(|c| c.is_ascii_uppercase()) {
            InstrumentKind::Stock
        } else {
            InstrumentKind::Stock
        }
    }
}

impl Default for ContractResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_category_default() {
        let resolver = ContractResolver::new();
        let descriptor = resolver.classify("MSTR", Category::Digitalassets);
        assert_eq!(descriptor.kind, InstrumentKind::Stock);
    }

    #[test]
    fn category_default_applies_without_override() {
        let resolver = ContractResolver::new();
        let descriptor = resolver.classify("COIN", Category::Digitalassets);
        assert_eq!(descriptor.kind, InstrumentKind::Crypto);
        assert_eq!(descriptor.exchange, "PAXOS");
    }

    #[test]
    fn etf_category_maps_to_etf_kind() {
        let resolver = ContractResolver::new();
        let descriptor = resolver.classify("SPY", Category::Etfs);
        assert_eq!(descriptor.kind, InstrumentKind::Etf);
        assert_eq!(descriptor.exchange, "SMART");
    }
}
