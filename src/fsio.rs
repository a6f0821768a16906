//! Atomic file writing.  Content is staged into a temporary file in the
//! destination directory and renamed into place, so readers never observe a
//! partially written script.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `content` to `path` atomically.  With `exclusive` set, the write
/// fails if the destination already exists; the temp file is cleaned up on
/// every failure path.
pub fn atomic_write(path: &Path, content: &str, exclusive: bool) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    if exclusive && path.exists() {
        return Err(anyhow!("file '{}' already exists", path.display()));
    }

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("could not create temp file in '{}'", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .context("failed writing temp file")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    if exclusive {
        tmp.persist_noclobber(path)
            .map_err(|e| anyhow!("could not create '{}': {}", path.display(), e.error))?;
    } else {
        tmp.persist(path)
            .map_err(|e| anyhow!("could not replace '{}': {}", path.display(), e.error))?;
    }

    Ok(())
}
