use clap::Subcommand;
use taskflow_core::storage::Database;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's focus totals and latest sessions
    Today,
}

pub fn run(action: StatsAction) -> CliResult {
    let db = Database::open()?;

    match action {
        StatsAction::Today => print_json(&db.today_summary()?)?,
    }
    Ok(())
}

pub fn history(limit: usize) -> CliResult {
    let db = Database::open()?;
    print_json(&db.recent_sessions(limit)?)
}
