//! Rough embedding cost estimation
//!
//! Reads files as text best-effort and approximates tokens at a fixed
//! characters-per-token ratio. This is a heuristic for the confirmation
//! gate, not billing-accurate pricing.

use crate::config::{CHARS_PER_TOKEN, EMBED_PRICE_PER_MILLION};
use std::path::PathBuf;
use tracing::warn;

/// A rough estimate for one batch of files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub total_chars: u64,
    pub est_tokens: u64,
    pub est_cost_usd: f64,
}

/// Sum character counts across `paths`, tolerating unreadable files and
/// invalid UTF-8 (lossy decode, skip on read error).
pub fn estimate(paths: &[PathBuf]) -> CostEstimate {
    let mut total_chars: u64 = 0;
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => {
                total_chars += String::from_utf8_lossy(&bytes).chars().count() as u64;
            }
            Err(e) => {
                warn!("Could not read {:?} for the estimate: {}", path, e);
            }
        }
    }

    let est_tokens = total_chars / CHARS_PER_TOKEN;
    let est_cost_usd = (est_tokens as f64 / 1_000_000.0) * EMBED_PRICE_PER_MILLION;
    CostEstimate {
        total_chars,
        est_tokens,
        est_cost_usd,
    }
}

/// Print the estimate the way the confirmation gate shows it.
pub fn print_estimate(est: &CostEstimate) {
    println!("=== Embedding cost estimate ===");
    println!("Total characters: {}", est.total_chars);
    println!(
        "Estimated tokens: {} (assuming ~{} chars/token)",
        est.est_tokens, CHARS_PER_TOKEN
    );
    println!(
        "Approximate one-off embedding cost: US${:.4} (at US${:.2} per 1M tokens)",
        est.est_cost_usd, EMBED_PRICE_PER_MILLION
    );
    println!("(Rough estimate; actual billing may differ.)");
}
