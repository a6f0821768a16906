use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;
use console::style;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct MigrationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Name")]
    name: String,
}

pub struct List;

impl Command for List {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        let rows = engine.status().await?;

        if rows.is_empty() {
            println!("No migrations found.");
            return Ok(Outcome::Success);
        }

        let display_rows: Vec<MigrationRow> = rows
            .into_iter()
            .map(|row| {
                let status = match row.status.as_str() {
                    "applied" => style("✓ applied").green().to_string(),
                    "failed" => style("✗ failed").red().to_string(),
                    _ => style("○ pending").dim().to_string(),
                };
                let name = if row.on_disk {
                    row.name
                } else {
                    format!("{} (file missing)", row.name)
                };
                MigrationRow {
                    id: row.id,
                    status,
                    name,
                }
            })
            .collect();

        let mut table = Table::new(display_rows);
        table.with(Style::sharp());
        println!("{}", table);

        Ok(Outcome::Success)
    }
}
