//! Command-line surface: `serve` runs the full pipeline until signalled to
//! stop; `reload-triggers` bulk-replaces the trigger reference table from a
//! CSV file (a deliberate stand-in for the source system's Excel import —
//! noted in the grounding ledger).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentinel_core::domain::TriggerMapping;
use tracing::info;

use crate::db::Database;
use crate::error::ServerError;
use crate::startup;

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Alert ingestion, classification, and ticketing pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the ingestion scheduler, the three pipeline consumers, and the
    /// supervisor. Default when no subcommand is given.
    Serve,
    /// Bulk-replace the trigger_mappings reference table from a CSV file
    /// with header
    /// `trigger_name,team,priority,responsible_person,recommended_action,actionable`.
    ReloadTriggers {
        #[arg(value_name = "CSV_PATH")]
        path: PathBuf,
    },
}

pub async fn run(cli: Cli) -> Result<(), ServerError> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::ReloadTriggers { path } => reload_triggers(&path).await,
    }
}

async fn serve() -> Result<(), ServerError> {
    let config = sentinel_core::config::Config::from_env();
    config.log_summary();

    let ctx = startup::build_app_context(config).await?;
    let server = startup::spawn_background_tasks(ctx);

    info!("sentinel is up; waiting for shutdown signal");
    tokio::signal::ctrl_c().await.map_err(|e| ServerError::Other(e.to_string()))?;
    info!("shutdown signal received");

    server.shutdown().await;
    Ok(())
}

async fn reload_triggers(path: &PathBuf) -> Result<(), ServerError> {
    let config = sentinel_core::config::Config::from_env();
    let db = Database::connect(&config.database.url).await?;

    let mappings = parse_trigger_csv(path)?;
    let count = mappings.len();
    db.reload_trigger_mappings(&mappings).await?;

    info!(count, path = %path.display(), "trigger mappings reloaded");
    Ok(())
}

const CSV_HEADER: &str = "trigger_name,team,priority,responsible_person,recommended_action,actionable";

/// Minimal CSV parser: no quoting/escaping support, one record per line,
/// `trigger_name,team,priority,responsible_person,recommended_action,actionable`
/// with `responsible_person`/`recommended_action` optional (empty means
/// absent) and `actionable` one of `true`/`false`, defaulting to `true` if
/// the field is left empty.
fn parse_trigger_csv(path: &PathBuf) -> Result<Vec<TriggerMapping>, ServerError> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines = contents.lines();

    let header = lines.next().ok_or_else(|| ServerError::Malformed("empty CSV file".to_string()))?;
    if header.trim() != CSV_HEADER {
        return Err(ServerError::Malformed(format!("unexpected CSV header: {header}")));
    }

    let mut mappings = Vec::new();
    for (line_number, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 6 {
            return Err(ServerError::Malformed(format!("row {} has {} fields, expected 6", line_number + 2, fields.len())));
        }
        let responsible_person = fields[3].trim();
        let recommended_action = fields[4].trim();
        let actionable = fields[5].trim();
        mappings.push(TriggerMapping {
            trigger_name: fields[0].trim().to_string(),
            team: fields[1].trim().to_string(),
            priority: fields[2].trim().to_string(),
            responsible_person: if responsible_person.is_empty() { None } else { Some(responsible_person.to_string()) },
            recommended_action: if recommended_action.is_empty() { None } else { Some(recommended_action.to_string()) },
            actionable: if actionable.is_empty() { true } else { actionable.eq_ignore_ascii_case("true") },
        });
    }

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers.csv");
        std::fs::write(
            &path,
            "trigger_name,team,priority,responsible_person,recommended_action,actionable\n\
             High CPU,SAP Basis,P1,jane@example.com,Restart the app server,true\n\
             Low Disk,Storage,P2,,,false\n",
        )
        .unwrap();

        let mappings = parse_trigger_csv(&path).unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].team, "SAP Basis");
        assert_eq!(mappings[0].responsible_person.as_deref(), Some("jane@example.com"));
        assert_eq!(mappings[0].recommended_action.as_deref(), Some("Restart the app server"));
        assert!(mappings[0].actionable);
        assert_eq!(mappings[1].responsible_person, None);
        assert_eq!(mappings[1].recommended_action, None);
        assert!(!mappings[1].actionable);
    }

    #[test]
    fn rejects_wrong_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers.csv");
        std::fs::write(&path, "a,b,c,d\n").unwrap();
        assert!(parse_trigger_csv(&path).is_err());
    }
}
