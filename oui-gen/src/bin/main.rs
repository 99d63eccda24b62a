use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "oui-gen")]
#[command(about = "Compile the oui-data vendor index into SmartRadar's OUI table", long_about = None)]
struct Cli {
    /// Input JSON index (`{"AABBCC": "Company", ...}`)
    #[arg(short, long)]
    input: PathBuf,

    /// Output Rust file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verify the output file is up to date instead of writing it
    #[arg(long, requires = "output")]
    check: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    log::info!("Compiling {}", cli.input.display());
    let table = oui_gen::compile_file(&cli.input)
        .with_context(|| format!("failed to compile {}", cli.input.display()))?;
    log::info!("{}", table.stats);

    match (cli.output, cli.check) {
        (Some(output), true) => {
            let existing = fs::read_to_string(&output)
                .with_context(|| format!("failed to read {}", output.display()))?;
            if oui_gen::is_up_to_date(&existing, &table) {
                log::info!("{} is up to date", output.display());
                Ok(ExitCode::SUCCESS)
            } else {
                log::error!("{} is stale; rerun without --check", output.display());
                Ok(ExitCode::FAILURE)
            }
        }
        (Some(output), false) => {
            fs::write(&output, oui_gen::emit_rust(&table))
                .with_context(|| format!("failed to write {}", output.display()))?;
            log::info!("Wrote {} entries to {}", table.entries.len(), output.display());
            Ok(ExitCode::SUCCESS)
        }
        (None, _) => {
            io::stdout().write_all(oui_gen::emit_rust(&table).as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
