pub mod config;
pub mod constitution;
pub mod progress;
pub mod quiz;

use wellcheck_core::{
    data_dir, AppConfig, FileBlobStore, Orchestrator, PersistenceManager, QuizPlan,
    UserPreferences,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Restore the orchestrator from the data directory using the loaded config.
pub fn open_orchestrator() -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let library = config.content_library()?;
    let dir = data_dir()?;
    tracing::debug!(dir = %dir.display(), key = %config.storage.key, "opening progress store");
    let store = FileBlobStore::new(dir)?;
    let persistence = PersistenceManager::with_key(Box::new(store), config.storage.key.clone());

    let mut quiz = Orchestrator::restore(QuizPlan::default(), Box::new(library), persistence)
        .with_autosave(config.autosave_policy());
    if quiz.preferences().locale != config.content.locale {
        quiz.set_preferences(UserPreferences {
            locale: config.content.locale.clone(),
            ..quiz.preferences().clone()
        });
    }
    Ok(quiz)
}

/// Print any serializable value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
