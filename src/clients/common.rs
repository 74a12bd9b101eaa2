// Shared arithmetic for model clients
// Author: kelexine (https://github.com/kelexine)

/// Rough token estimate (1 token ≈ 4 characters), never below one.
pub fn estimate_tokens(text: &str) -> u64 {
    ((text.chars().count() / 4) as u64).max(1)
}

/// Cost of a call given per-1K-token prices, rounded to six decimals.
pub fn compute_cost(tokens_in: u64, tokens_out: u64, price_in: f64, price_out: f64) -> f64 {
    let cost = (tokens_in as f64 / 1000.0) * price_in + (tokens_out as f64 / 1000.0) * price_out;
    (cost * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens(&"a".repeat(40)), 10);
    }

    #[test]
    fn test_compute_cost() {
        assert_eq!(compute_cost(1000, 1000, 0.0015, 0.002), 0.0035);
        assert_eq!(compute_cost(0, 0, 1.0, 1.0), 0.0);
        assert_eq!(compute_cost(6, 57, 0.0015, 0.002), 0.000123);
    }
}
