//! Top-level SQL statement splitting for non-transactional execution.
//!
//! Statements run one at a time in autocommit mode, so the split has to be
//! SQL-aware: semicolons inside quoted strings, quoted identifiers,
//! dollar-quoted bodies, and comments must not terminate a statement.

/// Split `sql` into individual statements.  Empty fragments are dropped; a
/// trailing statement without a terminating semicolon is kept.
pub fn split_statements(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                // Standard strings double the quote to escape it; E-strings
                // additionally use backslash escapes.
                let estring = is_estring_prefix(bytes, i);
                i = skip_quoted(bytes, i, b'\'', estring);
            }
            b'"' => {
                i = skip_quoted(bytes, i, b'"', false);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_line_comment(bytes, i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
            }
            b'$' => {
                i = skip_dollar_quoted(sql, bytes, i);
            }
            b';' => {
                let stmt = sql[start..i].trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    let tail = sql[start..].trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }

    statements
}

/// True when the quote at `i` is preceded by a bare `E`/`e` (PostgreSQL
/// escape-string syntax).
fn is_estring_prefix(bytes: &[u8], i: usize) -> bool {
    if i == 0 || !matches!(bytes[i - 1], b'E' | b'e') {
        return false;
    }
    // `table_e'x'` is an identifier followed by a string, not an E-string.
    i < 2 || !(bytes[i - 2].is_ascii_alphanumeric() || bytes[i - 2] == b'_')
}

fn skip_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            // A doubled quote is an escaped literal quote.
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 2;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(bytes: &[u8], open: usize) -> usize {
    // Block comments nest in PostgreSQL.
    let mut depth = 1;
    let mut i = open + 2;
    while i < bytes.len() && depth > 0 {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    i
}

/// Skip a `$tag$ ... $tag$` body.  If the `$` at `open` does not start a
/// valid dollar-quote delimiter it is treated as an ordinary character.
fn skip_dollar_quoted(sql: &str, bytes: &[u8], open: usize) -> usize {
    let Some(tag_end) = dollar_tag_end(bytes, open) else {
        return open + 1;
    };
    let delimiter = &sql[open..tag_end];
    match sql[tag_end..].find(delimiter) {
        Some(close) => tag_end + close + delimiter.len(),
        None => bytes.len(),
    }
}

/// Position one past the closing `$` of the opening delimiter, if the bytes
/// at `open` form one (`$$`, `$body$`, ...).  Tags are identifier-like and
/// may not start with a digit, which keeps `$1` parameters out.
fn dollar_tag_end(bytes: &[u8], open: usize) -> Option<usize> {
    match bytes.get(open + 1) {
        Some(b'$') => return Some(open + 2),
        Some(c) if c.is_ascii_alphabetic() || *c == b'_' => {}
        _ => return None,
    }
    let mut i = open + 2;
    while i < bytes.len() {
        match bytes[i] {
            b'$' => return Some(i + 1),
            c if c.is_ascii_alphanumeric() || c == b'_' => i += 1,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_plain_statements() {
        let stmts = split_statements("CREATE TABLE t (id INT);\nCREATE INDEX i ON t (id);\n");
        assert_eq!(
            stmts,
            vec!["CREATE TABLE t (id INT)", "CREATE INDEX i ON t (id)"]
        );
    }

    #[test]
    fn keeps_trailing_statement_without_semicolon() {
        let stmts = split_statements("SELECT 1;\nSELECT 2");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn drops_empty_fragments() {
        let stmts = split_statements(";;  ;\nSELECT 1;;");
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn semicolon_in_single_quotes_does_not_split() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b');SELECT 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn doubled_quote_escape() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s;fine');");
        assert_eq!(stmts, vec!["INSERT INTO t VALUES ('it''s;fine')"]);
    }

    #[test]
    fn estring_backslash_escape() {
        let stmts = split_statements(r"INSERT INTO t VALUES (E'a\';b');SELECT 1;");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn semicolon_in_quoted_identifier() {
        let stmts = split_statements(r#"CREATE TABLE "odd;name" (id INT);"#);
        assert_eq!(stmts, vec![r#"CREATE TABLE "odd;name" (id INT)"#]);
    }

    #[test]
    fn semicolon_in_line_comment() {
        let stmts = split_statements("SELECT 1 -- trailing; note\n;SELECT 2;");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn semicolon_in_nested_block_comment() {
        let stmts = split_statements("/* outer ; /* inner ; */ still out ; */ SELECT 1;");
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn dollar_quoted_function_body_stays_whole() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $$\nBEGIN\n  RETURN 1;\nEND;\n$$ LANGUAGE plpgsql;SELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("RETURN 1;"));
    }

    #[test]
    fn tagged_dollar_quotes() {
        let sql = "DO $body$ SELECT ';'; $body$;SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("DO $body$"));
    }

    #[test]
    fn dollar_parameter_is_not_a_delimiter() {
        let stmts = split_statements("PREPARE p AS SELECT $1;EXECUTE p(1);");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn unterminated_string_consumes_rest() {
        // Malformed input must not panic; the database will reject it.
        let stmts = split_statements("SELECT 'unterminated;");
        assert_eq!(stmts, vec!["SELECT 'unterminated;"]);
    }
}
