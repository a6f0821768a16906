use crate::commands::{Command, Outcome};
use crate::config::Config;
use anyhow::Result;

const PROMPT: &str = r#"# mg - Database Migration Tool Guide

You are an AI agent using `mg` to manage PostgreSQL database migrations.

## Core Rules
1. **Migrations Directory**: All SQL files reside in `migrations/`. Do not create them manually; use `mg create`.
2. **File Format**: Each file has a ULID prefix. Content is split into `-- migrate: up` and `-- migrate: down` sections.
3. **Atomicity**: Transactional by default. Use `-- migrate: no-transaction` for concurrent index creation.
4. **Configuration**: Managed via `mg.yaml` or `MG_DATABASE_URL`.

## Command Reference

### Setup
- `mg init`: Initialize a new project (creates `mg.yaml` and `migrations/`).

### Development
- `mg create <name>`: Generate a new migration file.
  - *Example*: `mg create add_users_table`
  - *Action*: After running, read the generated file and edit the SQL in the up and down sections.
- `mg apply`: Apply all pending migrations.
- `mg status`: Check which migrations are applied/pending.
- `mg verify`: Verify checksums of applied migrations against disk.

### Rollback
- `mg down`: Roll back the last applied migration.
- `mg rollback <n>`: Roll back the last N migrations.

### Advanced
- `mg apply --dry-run`: Verify SQL against the database without committing.
- `mg apply --env prod`: Target a specific environment profile from `mg.yaml`.
- `mg squash <name>`: Collapse all pending migrations into a single script.

## Typical Workflow
1. Check current status: `mg status`
2. Create migration: `mg create <description>`
3. Read file: `cat migrations/<generated_file>.sql`
4. Write SQL: Edit the file with up/down logic.
5. Apply: `mg apply`
6. Verify: `mg status`
"#;

pub struct Prompt;

impl Command for Prompt {
    async fn execute(&self, _config: &Config) -> Result<Outcome> {
        println!("{}", PROMPT);
        Ok(Outcome::Success)
    }
}
