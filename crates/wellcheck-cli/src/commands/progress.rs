use std::path::PathBuf;

use clap::Subcommand;

use super::{open_orchestrator, CliResult};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Write a checksummed export bundle
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace progress with an export bundle
    Import {
        /// Bundle file
        file: PathBuf,
    },
    /// Save the current progress now
    Save,
}

pub fn run(action: ProgressAction) -> CliResult {
    let mut quiz = open_orchestrator()?;

    match action {
        ProgressAction::Export { out } => {
            let json = quiz.export_progress()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        ProgressAction::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let event = quiz.import_progress(&json)?;
            quiz.save()?;
            println!("{}", serde_json::to_string(&event)?);
        }
        ProgressAction::Save => {
            let event = quiz.save()?;
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}
