//! Default values and fixed constants for ragdex configuration

/// File extensions accepted for retrieval, lowercase, without the dot.
/// `org` is an authoring format and is converted to Markdown before upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rtf", "docx", "pptx", "csv", "tsv", "html", "htm", "json", "xml",
    "org",
];

/// Prefix that distinguishes remote store identifiers from paths and globs.
pub const STORE_ID_PREFIX: &str = "vs_";

/// Reserved resolution token meaning "the most recently used store".
pub const AUTO_TOKEN: &str = "auto";

/// Rough characters-per-token ratio used by the cost estimate.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Approximate embedding price in USD per million tokens.
pub const EMBED_PRICE_PER_MILLION: f64 = 0.02;

/// How many retrieved passages the remote service may feed the model.
pub const MAX_NUM_RESULTS: u32 = 8;

/// Name given to newly created remote stores.
pub const STORE_NAME: &str = "ragdex-store";

pub fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}
