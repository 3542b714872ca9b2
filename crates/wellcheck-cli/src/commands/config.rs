use clap::Subcommand;
use wellcheck_core::AppConfig;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting
    Get {
        /// Dotted setting name, e.g. "autosave.interval_secs" or "content.bank_path"
        key: String,
    },
    /// Change one setting and write config.toml
    Set {
        key: String,
        /// Parsed as the setting's current type
        value: String,
    },
    /// Print every setting as `key = value`
    List {
        /// Print the whole config as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Overwrite config.toml with the defaults (stored progress is kept)
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let value = AppConfig::load()?
                .get(&key)
                .ok_or_else(|| format!("no setting named {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = AppConfig::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::debug!(%key, %value, "setting changed");
            println!("{key} = {}", config.get(&key).unwrap_or(value));
        }
        ConfigAction::List { json: true } => print_json(&AppConfig::load()?)?,
        ConfigAction::List { json: false } => {
            let config = AppConfig::load()?;
            for key in config.keys() {
                let value = config.get(&key).unwrap_or_else(|| "null".into());
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            AppConfig::default().save()?;
            eprintln!("defaults written to {}", AppConfig::path()?.display());
        }
    }
    Ok(())
}
