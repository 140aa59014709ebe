use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use log::info;

use tabula::{Config, QueryExecutor};

#[derive(Parser)]
#[command(version, about = "Maintenance tool for a tabula database directory", long_about = None)]
struct Cli {
    /// Directory holding the catalog, table files and log
    #[arg(long, default_value = "./tabula_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay the log, roll back unfinished transactions and report them
    Recover,
    /// List registered tables with their record counts
    Tables,
    /// Move the current log aside and start an empty one
    TruncateLog,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::builder().data_dir(cli.data_dir).build();
    let executor = QueryExecutor::open(config)?;

    match cli.command {
        Command::Recover => {
            let report = executor.recovery_report();
            println!(
                "Read {} log entries ({} malformed lines skipped)",
                report.recovery.entries_read, report.recovery.skipped_lines
            );
            if report.rolled_back.is_empty() {
                println!("No unfinished transactions");
            }
            for id in &report.rolled_back {
                let name = report
                    .recovery
                    .unfinished
                    .get(id)
                    .map(String::as_str)
                    .unwrap_or_default();
                println!("Rolled back unfinished transaction {} ({})", id, name);
            }
            for table in &report.discarded_shadows {
                println!("Discarded shadow copy of '{}'", table);
            }
            for table in &report.completed_commits {
                println!("Completed interrupted commit of '{}'", table);
            }
        }
        Command::Tables => {
            let ctx = executor.context();
            for path in ctx.catalog.table_paths()? {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let schema = ctx.store.read_schema(&path)?;
                let count = ctx.store.record_count(&path)?;
                println!("{}\t{}\t{} record(s)", name, schema, count);
            }
        }
        Command::TruncateLog => {
            let wal = &executor.context().wal;
            wal.truncate_log()?;
            info!("Log truncated");
            println!("Previous log saved to {}", wal.backup_path().display());
        }
    }

    Ok(())
}
