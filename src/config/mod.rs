//! Configuration for ragdex
//!
//! Credentials, model selection, and the cache location. There is no config
//! file: everything comes from the environment (with per-invocation flag
//! overrides handled by the CLI layer) or from `~/.authinfo`.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Runtime configuration, explicitly constructed and passed to the
/// orchestrator and query service.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the hosted vector-store/chat service
    pub api_key: String,

    /// Base URL of the remote API
    pub base_url: String,

    /// Model used for ask/chat (flag > env > default)
    pub model: String,

    /// Optional system prompt for ask/chat
    pub system_prompt: Option<String>,

    /// Location of the persisted session cache document
    pub cache_path: PathBuf,
}

impl Config {
    /// Default location of the session cache (~/.ragdex/sessions.json)
    pub fn default_cache_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragdex")
            .join("sessions.json")
    }

    /// Build a configuration with a resolved credential.
    ///
    /// `model` and `system_prompt` arrive from the CLI layer, which already
    /// applied flag/env precedence.
    pub fn load(model: String, system_prompt: Option<String>) -> Result<Self> {
        let api_key = load_api_key()?;
        let base_url = std::env::var("RAGDEX_BASE_URL").unwrap_or_else(|_| default_base_url());

        Ok(Self {
            api_key,
            base_url,
            model,
            system_prompt,
            cache_path: Self::default_cache_path(),
        })
    }
}

/// Resolve the API key: `OPENAI_API_KEY` first, then `~/.authinfo`.
pub fn load_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let authinfo = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".authinfo");
    if let Some(key) = parse_authinfo(&authinfo) {
        debug!("Using API key from {:?}", authinfo);
        return Ok(key);
    }

    Err(Error::Config(
        "API key not found.\n\
         Set OPENAI_API_KEY in the environment, or add a line to ~/.authinfo:\n\
         \x20 machine api.openai.com login apikey password sk-..."
            .to_string(),
    ))
}

/// Scan an authinfo file for the API key. Expected line format:
///
/// ```text
/// machine api.openai.com login apikey password sk-...
/// ```
///
/// Returns None if the file is absent or holds no matching line.
pub fn parse_authinfo(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let pattern = Regex::new(r"machine\s+api\.openai\.com.*password\s+(\S+)").ok()?;
    text.lines()
        .find_map(|line| pattern.captures(line))
        .map(|caps| caps[1].to_string())
}

/// True iff the extension (without dot, case-insensitive) is retrievable.
pub fn is_supported_extension(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&lower.as_str())
}

/// Comma-separated allow-list for user-facing messages.
pub fn supported_extensions_hint() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(", ")
}
