//! Session cache: the persistent map from local corpora to remote stores
//!
//! This is the only component with cross-invocation state. It tracks:
//! - `sessions`: canonical path-or-glob key -> remote store identifier
//! - `files_per_vs`: store identifier -> absolute paths already uploaded
//! - `last`: the store most recently created or extended
//!
//! The document is read fully, mutated in memory, and rewritten atomically
//! as a whole on every mutation. A missing or corrupt file degrades to an
//! empty cache (it is a memoization layer, not a source of truth); write
//! failures propagate.

use crate::config::{AUTO_TOKEN, STORE_ID_PREFIX};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Schema version written with every save. Loads key the upgrade path off
/// this tag or its absence.
const CACHE_VERSION: u32 = 2;

fn cache_version() -> u32 {
    CACHE_VERSION
}

/// The persisted cache document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheDoc {
    #[serde(default = "cache_version")]
    version: u32,

    /// Canonical session key -> store identifier (last write wins)
    #[serde(default)]
    sessions: BTreeMap<String, String>,

    /// Store identifier -> absolute file paths already uploaded.
    /// Entries never shrink.
    #[serde(default)]
    files_per_vs: BTreeMap<String, BTreeSet<String>>,

    /// Store touched by the most recent create-or-extend operation
    #[serde(default, alias = "_last")]
    last: Option<String>,
}

impl Default for CacheDoc {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            sessions: BTreeMap::new(),
            files_per_vs: BTreeMap::new(),
            last: None,
        }
    }
}

/// One row of `list_sessions` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub key: String,
    pub store_id: String,
    pub is_last: bool,
}

/// Handle over the cache document at a fixed path.
pub struct SessionCache {
    path: PathBuf,
    doc: CacheDoc,
}

impl SessionCache {
    /// Open the cache at `path`. Never fails: a missing, unreadable, or
    /// syntactically invalid file yields an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = load_doc(&path);
        Self { path, doc }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalize a path-or-glob into a session key. Pure: expands `~` and
    /// environment variables, then absolutizes inputs naming an existing
    /// directory. Glob strings stay verbatim after expansion, so two
    /// different globs matching the same files are different sessions.
    pub fn canonicalize(input: &str) -> String {
        let expanded = expand(input);
        let path = Path::new(&expanded);
        if path.is_dir() {
            std::path::absolute(path)
                .map(|p| p.display().to_string())
                .unwrap_or(expanded)
        } else {
            expanded
        }
    }

    /// Resolve a user token (`auto`, a raw store id, or a path/glob) to a
    /// store identifier.
    pub fn resolve(&self, token: &str) -> Result<String> {
        if token == AUTO_TOKEN {
            return self.doc.last.clone().ok_or_else(|| {
                Error::SessionNotFound(
                    "nothing has been indexed yet.\n\
                     Run `ragdex index <path-or-glob>` first."
                        .to_string(),
                )
            });
        }

        if token.starts_with(STORE_ID_PREFIX) {
            return Ok(token.to_string());
        }

        let key = Self::canonicalize(token);
        self.doc.sessions.get(&key).cloned().ok_or_else(|| {
            Error::SessionNotFound(format!(
                "no store is cached for key:\n  {key}\nRun `ragdex index \"{token}\"` first."
            ))
        })
    }

    /// Upsert `sessions[key] = store_id` and point `last` at it.
    pub fn record_session(&mut self, key: &str, store_id: &str) -> Result<()> {
        self.doc.sessions.insert(key.to_string(), store_id.to_string());
        self.doc.last = Some(store_id.to_string());
        self.persist()
    }

    /// Point `last` at `store_id` without touching any session key. Used
    /// when an extend operation was addressed by a raw store identifier.
    pub fn touch(&mut self, store_id: &str) -> Result<()> {
        self.doc.last = Some(store_id.to_string());
        self.persist()
    }

    /// Union `paths` (absolutized) into the uploaded set for `store_id`.
    /// Idempotent and order-independent; the set never shrinks.
    pub fn record_uploaded(&mut self, store_id: &str, paths: &[PathBuf]) -> Result<()> {
        let entry = self.doc.files_per_vs.entry(store_id.to_string()).or_default();
        for path in paths {
            entry.insert(to_absolute(path).display().to_string());
        }
        self.persist()
    }

    /// Absolute paths already recorded as uploaded; empty for unknown stores.
    pub fn already_uploaded(&self, store_id: &str) -> BTreeSet<PathBuf> {
        self.doc
            .files_per_vs
            .get(store_id)
            .map(|set| set.iter().map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    /// Read-only enumeration of cached sessions, in key order.
    pub fn list_sessions(&self) -> Vec<SessionEntry> {
        self.doc
            .sessions
            .iter()
            .map(|(key, store_id)| SessionEntry {
                key: key.clone(),
                store_id: store_id.clone(),
                is_last: self.doc.last.as_deref() == Some(store_id),
            })
            .collect()
    }

    /// Rewrite the whole document atomically: serialize into a temp file in
    /// the cache directory, then rename over the real path. Loud on failure.
    fn persist(&self) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, &self.doc)?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!("Cache persisted to {:?}", self.path);
        Ok(())
    }
}

/// Load and shape-upgrade the cache document, degrading to empty on any
/// read or parse failure.
fn load_doc(path: &Path) -> CacheDoc {
    if !path.exists() {
        return CacheDoc::default();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Cache file {:?} unreadable ({}); starting empty", path, e);
            return CacheDoc::default();
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => upgrade(value),
        Err(e) => {
            warn!("Cache file {:?} is not valid JSON ({}); starting empty", path, e);
            CacheDoc::default()
        }
    }
}

/// Single deterministic upgrade function, keyed off the version tag or its
/// absence:
/// - tagged, or untagged with `sessions`/`files_per_vs`: current shape
///   (`_last` accepted as an alias for `last`);
/// - anything else: the legacy flat shape `{key: store_id, "_last": id}`.
fn upgrade(raw: Value) -> CacheDoc {
    if raw.get("version").is_some()
        || raw.get("sessions").is_some()
        || raw.get("files_per_vs").is_some()
    {
        return serde_json::from_value(raw).unwrap_or_default();
    }

    let Value::Object(map) = raw else {
        return CacheDoc::default();
    };

    let mut doc = CacheDoc::default();
    for (key, value) in map {
        let Value::String(store_id) = value else {
            continue;
        };
        if key == "_last" {
            doc.last = Some(store_id);
        } else if !key.starts_with('_') {
            doc.sessions.insert(key, store_id);
        }
    }
    doc
}

/// Expand a leading `~` and `$VAR`/`${VAR}` references. References to
/// unset variables are left verbatim rather than collapsed, so a typoed
/// variable stays visible in the resulting key.
pub fn expand(input: &str) -> String {
    let mut out = if input == "~" || input.starts_with("~/") {
        match dirs::home_dir() {
            Some(home) => format!("{}{}", home.display(), &input[1..]),
            None => input.to_string(),
        }
    } else {
        input.to_string()
    };

    let var = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("static regex");
    out = var
        .replace_all(&out, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            match name.and_then(|n| std::env::var(n).ok()) {
                Some(value) => value,
                None => caps[0].to_string(),
            }
        })
        .into_owned();
    out
}

fn to_absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(tmp: &TempDir) -> SessionCache {
        SessionCache::open(tmp.path().join("sessions.json"))
    }

    #[test]
    fn test_canonicalize_directory_becomes_absolute() {
        let tmp = TempDir::new().unwrap();
        let key = SessionCache::canonicalize(tmp.path().to_str().unwrap());
        assert!(Path::new(&key).is_absolute());
    }

    #[test]
    fn test_canonicalize_glob_stays_verbatim() {
        let key = SessionCache::canonicalize("/no/such/dir/**/*.md");
        assert_eq!(key, "/no/such/dir/**/*.md");
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let tmp = TempDir::new().unwrap();
        for input in [tmp.path().to_str().unwrap(), "/no/such/dir/**/*.org"] {
            let once = SessionCache::canonicalize(input);
            assert_eq!(SessionCache::canonicalize(&once), once);
        }
    }

    #[test]
    fn test_expand_env_var() {
        std::env::set_var("RAGDEX_TEST_EXPAND", "/data");
        assert_eq!(expand("$RAGDEX_TEST_EXPAND/notes"), "/data/notes");
        assert_eq!(expand("${RAGDEX_TEST_EXPAND}/notes"), "/data/notes");
    }

    #[test]
    fn test_expand_unset_var_stays_verbatim() {
        std::env::remove_var("RAGDEX_TEST_NEVER_SET");
        assert_eq!(
            expand("$RAGDEX_TEST_NEVER_SET/notes"),
            "$RAGDEX_TEST_NEVER_SET/notes"
        );
        assert_eq!(
            expand("${RAGDEX_TEST_NEVER_SET}/notes"),
            "${RAGDEX_TEST_NEVER_SET}/notes"
        );
    }

    #[test]
    fn test_resolve_auto_before_any_session() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert!(matches!(cache.resolve("auto"), Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn test_resolve_auto_after_record_session() {
        let tmp = TempDir::new().unwrap();
        let mut cache = cache_in(&tmp);
        cache.record_session("/some/key", "vs_abc").unwrap();
        assert_eq!(cache.resolve("auto").unwrap(), "vs_abc");
    }

    #[test]
    fn test_resolve_store_id_passes_through() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert_eq!(cache.resolve("vs_raw").unwrap(), "vs_raw");
    }

    #[test]
    fn test_resolve_unknown_key_fails() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert!(matches!(
            cache.resolve("/never/indexed"),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_record_uploaded_idempotent_and_absolute() {
        let tmp = TempDir::new().unwrap();
        let mut cache = cache_in(&tmp);
        let paths = vec![PathBuf::from("/docs/a.md"), PathBuf::from("/docs/b.txt")];

        cache.record_uploaded("vs_1", &paths).unwrap();
        let first = cache.already_uploaded("vs_1");
        assert_eq!(first.len(), 2);
        assert!(first.contains(&PathBuf::from("/docs/a.md")));

        // same set again, reversed: no change
        let reversed: Vec<_> = paths.iter().rev().cloned().collect();
        cache.record_uploaded("vs_1", &reversed).unwrap();
        assert_eq!(cache.already_uploaded("vs_1"), first);
    }

    #[test]
    fn test_uploaded_set_never_shrinks() {
        let tmp = TempDir::new().unwrap();
        let mut cache = cache_in(&tmp);
        cache.record_uploaded("vs_1", &[PathBuf::from("/docs/a.md")]).unwrap();
        cache.record_uploaded("vs_1", &[PathBuf::from("/docs/b.md")]).unwrap();
        assert_eq!(cache.already_uploaded("vs_1").len(), 2);
    }

    #[test]
    fn test_already_uploaded_unknown_store_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert!(cache.already_uploaded("vs_nope").is_empty());
    }

    #[test]
    fn test_legacy_flat_shape_upgrades() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        std::fs::write(&path, r#"{"keyA": "vs_1", "_last": "vs_1"}"#).unwrap();

        let cache = SessionCache::open(&path);
        assert_eq!(cache.resolve("auto").unwrap(), "vs_1");
        let sessions = cache.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].key, "keyA");
        assert_eq!(sessions[0].store_id, "vs_1");
        assert!(sessions[0].is_last);
        assert!(cache.already_uploaded("vs_1").is_empty());
    }

    #[test]
    fn test_untagged_nested_shape_upgrades() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"{"sessions": {"k": "vs_2"}, "files_per_vs": {"vs_2": ["/a.md"]}, "_last": "vs_2"}"#,
        )
        .unwrap();

        let cache = SessionCache::open(&path);
        assert_eq!(cache.resolve("auto").unwrap(), "vs_2");
        assert_eq!(cache.already_uploaded("vs_2").len(), 1);
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty_then_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut cache = SessionCache::open(&path);
        assert!(cache.list_sessions().is_empty());

        cache.record_session("/k", "vs_3").unwrap();
        let reloaded = SessionCache::open(&path);
        assert_eq!(reloaded.resolve("auto").unwrap(), "vs_3");
    }

    #[test]
    fn test_persisted_document_carries_version_tag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.json");
        let mut cache = SessionCache::open(&path);
        cache.record_session("/k", "vs_4").unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 2);
        assert_eq!(raw["sessions"]["/k"], "vs_4");
        assert_eq!(raw["last"], "vs_4");
    }

    #[test]
    fn test_record_session_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        let mut cache = cache_in(&tmp);
        cache.record_session("/k", "vs_old").unwrap();
        cache.record_session("/k", "vs_new").unwrap();

        // "/k" is not an existing dir, so canonicalize leaves it verbatim
        assert_eq!(cache.resolve("/k").unwrap(), "vs_new");
        let entries = cache.list_sessions();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].store_id, "vs_new");
        assert_eq!(cache.resolve("auto").unwrap(), "vs_new");
    }
}
