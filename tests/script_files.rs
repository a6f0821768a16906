//! Filesystem-level tests for script creation and discovery.  No database
//! required.

use mg::commands::{Command, Create, Seed};
use mg::config::{Config, Hooks};
use mg::{corpus, script};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn test_config(root: &Path) -> Config {
    Config {
        connection: None,
        lock_id: mg::config::DEFAULT_LOCK_ID,
        hooks: Hooks::default(),
        environment: "default".to_string(),
        scripts_dir: root.join("migrations"),
        seeds_dir: root.join("seeds"),
    }
}

#[tokio::test]
async fn create_writes_a_parseable_template() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.scripts_dir).unwrap();

    Create {
        name: "Add Users Table".to_string(),
    }
    .execute(&config)
    .await
    .unwrap();

    let scripts = corpus::list_scripts(&config.scripts_dir).unwrap();
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].name, "add_users_table");
    assert_eq!(scripts[0].id.len(), 26);

    // The template has both markers; the empty up section is a parse error
    // until the user fills it in.
    let content = fs::read_to_string(&scripts[0].path).unwrap();
    assert!(content.contains("-- migrate: up"));
    assert!(content.contains("-- migrate: down"));
    let err = script::parse(&content, "template.sql").unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[tokio::test]
async fn create_requires_the_scripts_directory() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let err = Create {
        name: "orphan".to_string(),
    }
    .execute(&config)
    .await
    .unwrap_err();
    assert!(err.to_string().contains("mg init"));
}

#[tokio::test]
async fn created_scripts_sort_in_creation_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.scripts_dir).unwrap();

    for name in ["first", "second", "third"] {
        Create {
            name: name.to_string(),
        }
        .execute(&config)
        .await
        .unwrap();
        // ULIDs only tick per millisecond.
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let scripts = corpus::list_scripts(&config.scripts_dir).unwrap();
    let names: Vec<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn seed_create_makes_a_seed_file() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    Seed {
        create: Some("Base Users".to_string()),
    }
    .execute(&config)
    .await
    .unwrap();

    let path = config.seeds_dir.join("base_users.sql");
    assert!(path.exists());

    // Exclusive create: a second seed with the same name is refused.
    let err = Seed {
        create: Some("Base Users".to_string()),
    }
    .execute(&config)
    .await
    .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}
