//! Discovery and ordering of migration scripts on disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A migration script found in the scripts directory.  `id` is the filename
/// prefix up to the first underscore, `name` the remainder minus `.sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

/// List migration scripts in `dir`, sorted ascending by id (plain lexical
/// compare; ids are fixed-length ULIDs).  Files without a `.sql` extension or
/// without an underscore in the name are skipped.  A missing directory yields
/// an empty corpus.
pub fn list_scripts(dir: &Path) -> Result<Vec<ScriptFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("could not read scripts directory '{}'", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((id, name)) = stem.split_once('_') else {
            continue;
        };
        scripts.push(ScriptFile {
            id: id.to_string(),
            name: name.to_string(),
            path,
        });
    }

    scripts.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "-- migrate: up\nSELECT 1;\n").unwrap();
    }

    #[test]
    fn missing_directory_is_empty() {
        let scripts = list_scripts(Path::new("/nonexistent/migrations")).unwrap();
        assert!(scripts.is_empty());
    }

    #[test]
    fn lists_and_sorts_by_id() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "01B_second.sql");
        touch(dir.path(), "01A_first.sql");
        touch(dir.path(), "01C_third.sql");

        let scripts = list_scripts(dir.path()).unwrap();
        let ids: Vec<&str> = scripts.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["01A", "01B", "01C"]);
        assert_eq!(scripts[0].name, "first");
    }

    #[test]
    fn skips_files_without_underscore_or_sql_suffix() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "01A_valid.sql");
        touch(dir.path(), "nounderscore.sql");
        fs::write(dir.path().join("README.md"), "docs").unwrap();

        let scripts = list_scripts(dir.path()).unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].id, "01A");
    }

    #[test]
    fn slug_keeps_later_underscores() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "01A_create_users_table.sql");

        let scripts = list_scripts(dir.path()).unwrap();
        assert_eq!(scripts[0].name, "create_users_table");
    }
}
