// Static route price table

use axum::http::Method;
use std::collections::HashMap;

/// Price of one paid chat message, in whole tokens
pub const CHAT_PRICE: u64 = 1000;

/// Maps (method, path) to a price in whole tokens. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<(Method, String), u64>,
}

impl PriceTable {
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// The default tiers served by `gpt402 serve`
    pub fn with_defaults(chat_price: u64) -> Self {
        Self::empty()
            .route(Method::GET, "/api/free-data", 0)
            .route(Method::GET, "/api/premium-data", 10_000)
            .route(Method::GET, "/api/ultra-premium", 50_000)
            .route(Method::GET, "/api/enterprise-data", 100_000)
            .route(Method::POST, "/api/chat", chat_price)
    }

    pub fn route(mut self, method: Method, path: impl Into<String>, price: u64) -> Self {
        self.prices.insert((method, path.into()), price);
        self
    }

    /// Price for a request, `None` when the route is not listed
    pub fn price_for(&self, method: &Method, path: &str) -> Option<u64> {
        self.prices.get(&(method.clone(), path.to_string())).copied()
    }

    /// Whether a request must carry a payment proof
    pub fn requires_payment(&self, method: &Method, path: &str) -> bool {
        matches!(self.price_for(method, path), Some(price) if price > 0)
    }

    /// Priced routes sorted by path, for startup logging
    pub fn entries(&self) -> Vec<(Method, String, u64)> {
        let mut entries: Vec<_> = self
            .prices
            .iter()
            .map(|((method, path), price)| (method.clone(), path.clone(), *price))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        entries
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::with_defaults(CHAT_PRICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prices() {
        let table = PriceTable::default();
        assert_eq!(table.price_for(&Method::GET, "/api/free-data"), Some(0));
        assert_eq!(table.price_for(&Method::GET, "/api/premium-data"), Some(10_000));
        assert_eq!(table.price_for(&Method::GET, "/api/ultra-premium"), Some(50_000));
        assert_eq!(table.price_for(&Method::GET, "/api/enterprise-data"), Some(100_000));
        assert_eq!(table.price_for(&Method::POST, "/api/chat"), Some(1000));
    }

    #[test]
    fn test_method_is_part_of_the_key() {
        let table = PriceTable::default();
        assert_eq!(table.price_for(&Method::GET, "/api/chat"), None);
        assert_eq!(table.price_for(&Method::POST, "/api/premium-data"), None);
    }

    #[test]
    fn test_requires_payment() {
        let table = PriceTable::default();
        assert!(!table.requires_payment(&Method::GET, "/api/free-data"));
        assert!(!table.requires_payment(&Method::GET, "/health"));
        assert!(table.requires_payment(&Method::POST, "/api/chat"));
    }

    #[test]
    fn test_custom_chat_price() {
        let table = PriceTable::with_defaults(250);
        assert_eq!(table.price_for(&Method::POST, "/api/chat"), Some(250));
        assert_eq!(table.entries().len(), 5);
    }
}
