//! Index and extend commands
//!
//! The orchestrator composes the collector, the cost gate, the format
//! normalizer, the session cache, and the remote client. It is best effort
//! per file and all-or-nothing per confirmation gate: once the user accepts
//! the estimate, individual upload failures are reported but never abort
//! the batch, and only files that succeeded are recorded as uploaded.

use crate::cache::SessionCache;
use crate::collect::{collect, Collected};
use crate::config::{AUTO_TOKEN, STORE_ID_PREFIX, STORE_NAME};
use crate::convert::prepare_for_upload;
use crate::error::{Error, Result};
use crate::estimate::{estimate, CostEstimate};
use crate::remote::VectorStoreClient;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What happened to one file of an upload batch.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Uploaded { file_id: String },
    Failed { reason: String },
}

/// Per-file results for one create/extend run.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub entries: Vec<(PathBuf, UploadOutcome)>,
}

impl UploadReport {
    /// Paths that made it into the remote store.
    pub fn uploaded_paths(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, UploadOutcome::Uploaded { .. }))
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn failures(&self) -> Vec<(&Path, &str)> {
        self.entries
            .iter()
            .filter_map(|(p, o)| match o {
                UploadOutcome::Failed { reason } => Some((p.as_path(), reason.as_str())),
                UploadOutcome::Uploaded { .. } => None,
            })
            .collect()
    }
}

/// Result of a create/extend command.
#[derive(Debug)]
pub enum IndexOutcome {
    /// The batch ran; the report says which files made it.
    Completed {
        store_id: String,
        report: UploadReport,
    },
    /// Extend found nothing new; no prompt, no remote calls.
    NothingToDo { store_id: String },
    /// The user declined the cost estimate; nothing was touched.
    Aborted,
}

/// Confirmation gate injected by the caller. The CLI wires this to an
/// interactive prompt; tests pass a closure.
pub type ConfirmFn<'a> = dyn FnMut(&CostEstimate) -> bool + 'a;

/// Create a new store for `pattern` and upload every supported file.
pub fn cmd_index(
    cache: &mut SessionCache,
    remote: &dyn VectorStoreClient,
    pattern: &str,
    confirm: &mut ConfirmFn,
) -> Result<IndexOutcome> {
    let collected = collect(pattern)?;
    report_skipped(&collected);
    println!("Found {} supported files.", collected.supported.len());

    if !confirm(&estimate(&collected.supported)) {
        return Ok(IndexOutcome::Aborted);
    }

    let store_id = remote.create_store(STORE_NAME)?;
    info!("Created store {}", store_id);
    println!("\nVector store created: {store_id}");
    println!("Uploading {} files...", collected.supported.len());

    let report = upload_batch(remote, &store_id, &collected.supported);

    let uploaded = report.uploaded_paths();
    if !uploaded.is_empty() {
        cache.record_uploaded(&store_id, &uploaded)?;
    }
    cache.record_session(&SessionCache::canonicalize(pattern), &store_id)?;

    Ok(IndexOutcome::Completed { store_id, report })
}

/// Attach the files matched by `pattern` that the cache has not already
/// recorded for the store `token` resolves to.
pub fn cmd_extend(
    cache: &mut SessionCache,
    remote: &dyn VectorStoreClient,
    token: &str,
    pattern: &str,
    confirm: &mut ConfirmFn,
) -> Result<IndexOutcome> {
    let store_id = cache.resolve(token)?;

    let collected = collect(pattern)?;
    report_skipped(&collected);

    let already = cache.already_uploaded(&store_id);
    let new_files: Vec<PathBuf> = collected
        .supported
        .into_iter()
        .filter(|p| !already.contains(p))
        .collect();

    if new_files.is_empty() {
        println!("Nothing to do: every matched file is already in this vector store.");
        // still the most recent extend target: `ask auto` should land here
        record_extend_target(cache, token, &store_id)?;
        return Ok(IndexOutcome::NothingToDo { store_id });
    }

    println!("Found {} new files to attach.", new_files.len());
    if !confirm(&estimate(&new_files)) {
        return Ok(IndexOutcome::Aborted);
    }

    println!("\nAttaching files to existing vector store: {store_id}");
    let report = upload_batch(remote, &store_id, &new_files);

    let uploaded = report.uploaded_paths();
    if !uploaded.is_empty() {
        cache.record_uploaded(&store_id, &uploaded)?;
    }
    record_extend_target(cache, token, &store_id)?;

    Ok(IndexOutcome::Completed { store_id, report })
}

/// Re-record the session (or just `last` for raw id/`auto` tokens) so the
/// extended store is what `auto` resolves to afterwards.
fn record_extend_target(cache: &mut SessionCache, token: &str, store_id: &str) -> Result<()> {
    if token == AUTO_TOKEN || token.starts_with(STORE_ID_PREFIX) {
        cache.touch(store_id)
    } else {
        cache.record_session(&SessionCache::canonicalize(token), store_id)
    }
}

/// Upload a batch, one file at a time. Conversion scratch space is dropped
/// after each attempt, whether or not the upload succeeded.
fn upload_batch(
    remote: &dyn VectorStoreClient,
    store_id: &str,
    paths: &[PathBuf],
) -> UploadReport {
    let mut report = UploadReport::default();

    for path in paths {
        let attempt = prepare_for_upload(path)
            .and_then(|prepared| remote.upload_file(store_id, &prepared.upload_path));

        match attempt {
            Ok(file_id) => {
                println!("  OK: {} -> file_id={}", path.display(), file_id);
                report
                    .entries
                    .push((path.clone(), UploadOutcome::Uploaded { file_id }));
            }
            Err(err) => {
                match &err {
                    Error::RemoteRequest(msg) => {
                        warn!("Rejected upload for {} (bad request): {}", path.display(), msg)
                    }
                    other => warn!("Upload failed for {}: {}", path.display(), other),
                }
                println!("  FAILED: {} ({err})", path.display());
                report.entries.push((
                    path.clone(),
                    UploadOutcome::Failed {
                        reason: err.to_string(),
                    },
                ));
            }
        }
    }

    report
}

fn report_skipped(collected: &Collected) {
    if collected.skipped.is_empty() {
        return;
    }
    println!("Skipping files with unsupported extensions:");
    for path in &collected.skipped {
        println!("  {}", path.display());
    }
    println!();
}
