pub mod config;
pub mod stats;
pub mod task;
pub mod timer;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
