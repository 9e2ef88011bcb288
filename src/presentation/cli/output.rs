//! Rendering of task outcomes and failures.

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};

use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;

/// Output format of the task result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// YAML document
    Yaml,
}

impl OutputFormat {
    pub fn render<T: Serialize>(&self, value: &T) -> TaskResult<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(value)?,
            Self::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

/// The record printed in place of an outcome when a task fails.
pub fn failure_record(error: &TaskError) -> Value {
    json!({
        "changed": false,
        "failed": true,
        "msg": error.to_string(),
    })
}

/// One-word verdict for the terminal, colored like the status it reports.
pub fn summary(result: &TaskResult<TaskOutcome>) -> String {
    match result {
        Ok(outcome) if outcome.changed => "changed".yellow().bold().to_string(),
        Ok(_) => "ok".green().bold().to_string(),
        Err(_) => "failed".red().bold().to_string(),
    }
}
