//! Syntactic address validation per network

use once_cell::sync::Lazy;
use regex::Regex;

static ETH_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap());
static BTC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(1|3|bc1)[a-zA-Z0-9]{25,59}$").unwrap());
static TRX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T[a-zA-Z0-9]{33}$").unwrap());

/// Check whether `address` is syntactically plausible for `network`.
///
/// Pure and total: no lookups, never panics, worst case returns false.
/// Unknown networks fall back to a lax length check - a known gap kept
/// on purpose, the providers do the authoritative validation.
pub fn validate_address(address: &str, network: &str) -> bool {
    match network.to_lowercase().as_str() {
        "matic" | "eth" | "bsc" | "ethereum" => ETH_STYLE.is_match(address),
        "btc" | "bitcoin" => BTC.is_match(address),
        "trx" | "tron" => TRX.is_match(address),
        _ => address.len() > 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_style_addresses() {
        let addr = format!("0x{}", "a1".repeat(20));
        assert!(validate_address(&addr, "matic"));
        assert!(validate_address(&addr, "ETH"));
        assert!(validate_address(&addr, "bsc"));
        assert!(validate_address(&addr, "ethereum"));

        assert!(!validate_address("0x1234", "matic"));
        assert!(!validate_address(&format!("0x{}", "g1".repeat(20)), "eth"));
        assert!(!validate_address(&format!("1x{}", "a1".repeat(20)), "eth"));
    }

    #[test]
    fn test_btc_addresses() {
        assert!(validate_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "btc"));
        assert!(validate_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", "bitcoin"));
        assert!(validate_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", "btc"));
        assert!(!validate_address("notanaddress", "btc"));
        assert!(!validate_address("2A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "btc"));
    }

    #[test]
    fn test_trx_addresses() {
        let addr = format!("T{}", "a".repeat(33));
        assert!(validate_address(&addr, "trx"));
        assert!(validate_address(&addr, "tron"));
        assert!(!validate_address(&format!("T{}", "a".repeat(32)), "trx"));
        assert!(!validate_address(&format!("X{}", "a".repeat(33)), "trx"));
    }

    #[test]
    fn test_unknown_network_is_lax() {
        assert!(validate_address("addr1q9e2jk4dpq7w0yv3", "ada"));
        assert!(!validate_address("short", "ada"));
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert!(!validate_address("notanaddress", "btc"));
        }
    }
}
