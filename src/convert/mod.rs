//! Format normalization before upload
//!
//! Org-mode files are authored locally but not retrievable as-is, so they
//! are converted to Markdown with pandoc inside a fresh scratch directory.
//! The scratch directory is owned by the returned handle and removed on
//! drop, success or failure. Every other supported format uploads as-is.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::debug;

/// A file ready for upload. Holds the scratch directory (if any) so
/// cleanup happens on every exit path.
pub struct PreparedFile {
    pub upload_path: PathBuf,
    _scratch: Option<TempDir>,
}

/// True iff `path` needs conversion before upload.
pub fn needs_conversion(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("org"))
}

/// Prepare `path` for upload: identity for most formats, pandoc
/// `.org` -> `.md` conversion into a scratch directory otherwise.
pub fn prepare_for_upload(path: &Path) -> Result<PreparedFile> {
    if !needs_conversion(path) {
        return Ok(PreparedFile {
            upload_path: path.to_path_buf(),
            _scratch: None,
        });
    }

    let scratch = TempDir::with_prefix("ragdex-org-")?;
    let stem = path
        .file_stem()
        .ok_or_else(|| Error::ConversionFailed(format!("{}: no file name", path.display())))?;
    let md_path = scratch.path().join(stem).with_extension("md");

    debug!("Converting {:?} -> {:?}", path, md_path);

    run_converter(CONVERTER, path, &md_path)?;

    Ok(PreparedFile {
        upload_path: md_path,
        _scratch: Some(scratch),
    })
}

const CONVERTER: &str = "pandoc";

/// Invoke the external converter, distinguishing "not installed" from a
/// failed conversion; the converter's stderr is surfaced on failure.
fn run_converter(program: &str, input: &Path, output: &Path) -> Result<()> {
    let result = Command::new(program)
        .arg(input)
        .arg("-o")
        .arg(output)
        .stdout(Stdio::null())
        .output();

    match result {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::ConversionFailed(format!(
            "{program} is not installed.\nInstall {program} to index .org files."
        ))),
        Err(e) => Err(Error::ConversionFailed(format!(
            "could not run {program} for {}: {e}",
            input.display()
        ))),
        Ok(out) if !out.status.success() => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let detail = match stderr.trim() {
                "" => "no diagnostics".to_string(),
                text => text.to_string(),
            };
            Err(Error::ConversionFailed(format!(
                "{program} exited with {} converting {}: {detail}",
                out.status,
                input.display()
            )))
        }
        Ok(_) => Ok(()),
    }
}
