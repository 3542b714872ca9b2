use clap::Args;
use wellcheck_core::{assess_constitution, AppConfig, Answer};

use super::{print_json, CliResult};

#[derive(Args)]
pub struct ConstitutionArgs {
    /// Answers as question_id=value or question_id=value1,value2
    #[arg(required = true)]
    pub answers: Vec<String>,
    /// Locale override
    #[arg(long)]
    pub locale: Option<String>,
}

fn parse_answer(raw: &str) -> Result<Answer, String> {
    let (id, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected question_id=value, got '{raw}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing question id in '{raw}'"));
    }
    let values: Vec<&str> = values.split(',').collect();
    Ok(Answer::new(id, values))
}

pub fn run(args: ConstitutionArgs) -> CliResult {
    let config = AppConfig::load()?;
    let library = config.content_library()?;
    let locale = args.locale.unwrap_or(config.content.locale);

    let answers = args
        .answers
        .iter()
        .map(|raw| parse_answer(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let report = assess_constitution(&library, &locale, &answers);
    print_json(&report)
}
