//! Migration script parsing.
//!
//! A script is a plain SQL file split into sections by directive comments:
//!
//! ```sql
//! -- migrate: up
//! CREATE TABLE users (id SERIAL PRIMARY KEY);
//!
//! -- migrate: down
//! DROP TABLE users;
//! ```
//!
//! `-- migrate: no-transaction` may appear anywhere and flags the script for
//! autocommit execution (needed for e.g. CREATE INDEX CONCURRENTLY).

use crate::engine::EngineError;
use sha2::{Digest, Sha256};
use tracing::warn;

const UP_MARKER: &str = "-- migrate: up";
const DOWN_MARKER: &str = "-- migrate: down";
const NO_TRANSACTION_MARKER: &str = "-- migrate: no-transaction";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    pub up: String,
    pub down: String,
    pub no_transaction: bool,
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Up,
    Down,
}

/// Split script text into up/down SQL and the no-transaction flag.
///
/// Directive matching is a prefix match on the trimmed line, so trailing text
/// after a marker is ignored.  Lines before the first marker are discarded.
/// A missing or empty up section is an error; a missing down section is only
/// a warning since some migrations are intentionally irreversible.
pub fn parse(content: &str, filename: &str) -> Result<ParsedScript, EngineError> {
    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut section = Section::None;
    let mut no_transaction = false;
    let mut found_up = false;
    let mut found_down = false;

    for line in content.lines() {
        let stripped = line.trim();
        if stripped.starts_with(UP_MARKER) {
            section = Section::Up;
            found_up = true;
            continue;
        } else if stripped.starts_with(NO_TRANSACTION_MARKER) {
            // Position independent; does not change the current section.
            no_transaction = true;
            continue;
        } else if stripped.starts_with(DOWN_MARKER) {
            section = Section::Down;
            found_down = true;
            continue;
        }

        match section {
            Section::Up => up.push(line),
            Section::Down => down.push(line),
            Section::None => {}
        }
    }

    let up = up.join("\n").trim().to_string();
    let down = down.join("\n").trim().to_string();

    if !found_up {
        return Err(EngineError::Parse {
            file: filename.to_string(),
            message: format!("missing '{}' marker", UP_MARKER),
        });
    }
    if up.is_empty() {
        return Err(EngineError::Parse {
            file: filename.to_string(),
            message: format!("empty '{}' section", UP_MARKER),
        });
    }
    if !found_down || down.is_empty() {
        warn!("migration {} has no '{}' section", filename, DOWN_MARKER);
    }

    Ok(ParsedScript {
        up,
        down,
        no_transaction,
    })
}

/// SHA-256 of the full script content, lowercase hex.  Stored in the ledger
/// at apply time and compared during `verify`.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_up_and_down() {
        let parsed = parse(
            "-- migrate: up\nCREATE TABLE t (id INT);\n\n-- migrate: down\nDROP TABLE t;\n",
            "test.sql",
        )
        .unwrap();
        assert_eq!(parsed.up, "CREATE TABLE t (id INT);");
        assert_eq!(parsed.down, "DROP TABLE t;");
        assert!(!parsed.no_transaction);
    }

    #[test]
    fn no_transaction_is_position_independent() {
        let parsed = parse(
            "-- migrate: up\nCREATE INDEX CONCURRENTLY i ON t (id);\n-- migrate: no-transaction\n",
            "test.sql",
        )
        .unwrap();
        assert!(parsed.no_transaction);
        assert_eq!(parsed.up, "CREATE INDEX CONCURRENTLY i ON t (id);");
    }

    #[test]
    fn preamble_lines_are_discarded() {
        let parsed = parse(
            "-- migration: add users\n-- id: 01ABC\n\n-- migrate: up\nSELECT 1;\n",
            "test.sql",
        )
        .unwrap();
        assert_eq!(parsed.up, "SELECT 1;");
    }

    #[test]
    fn directive_trailing_text_is_ignored() {
        let parsed =
            parse("-- migrate: up (creates users)\nSELECT 1;\n", "test.sql").unwrap();
        assert_eq!(parsed.up, "SELECT 1;");
    }

    #[test]
    fn indentation_is_preserved() {
        let parsed = parse(
            "-- migrate: up\nCREATE FUNCTION f() RETURNS int AS $$\n    SELECT 1;\n$$ LANGUAGE sql;\n",
            "test.sql",
        )
        .unwrap();
        assert!(parsed.up.contains("\n    SELECT 1;"));
    }

    #[test]
    fn missing_up_marker_is_an_error() {
        let err = parse("SELECT 1;\n", "broken.sql").unwrap_err();
        assert!(err.to_string().contains("broken.sql"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn empty_up_section_is_an_error() {
        let err = parse("-- migrate: up\n\n-- migrate: down\nDROP TABLE t;\n", "empty.sql")
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn missing_down_is_allowed() {
        let parsed = parse("-- migrate: up\nSELECT 1;\n", "test.sql").unwrap();
        assert_eq!(parsed.down, "");
    }

    #[test]
    fn checksum_is_stable_hex_sha256() {
        assert_eq!(
            checksum("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(checksum("hello").len(), 64);
        assert_ne!(checksum("hello"), checksum("hello "));
    }
}
