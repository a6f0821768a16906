use regex::Regex;
use ulid::Ulid;

/// Generate a new script identifier.  ULIDs are 26 Crockford base32
/// characters and sort lexicographically by creation time, which is what the
/// corpus ordering relies on.
pub fn new_id() -> String {
    Ulid::new().to_string()
}

/// Reduce a human-provided migration name to a filename-safe slug.
pub fn slugify(name: &str) -> String {
    let re = Regex::new(r"[^a-z0-9]+").expect("static pattern");
    re.replace_all(&name.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_26_chars() {
        let id = new_id();
        assert_eq!(id.len(), 26);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = new_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_id();
        assert!(a < b);
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Add Users Table!"), "add_users_table");
        assert_eq!(slugify("--weird--name--"), "weird_name");
        assert_eq!(slugify("already_fine"), "already_fine");
    }
}
