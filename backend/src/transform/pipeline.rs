//! Recipe pipeline: replay a JSON list of operations against a file.
//!
//! # Example
//!
//! ```rust,ignore
//! use dataprep::transform::pipeline::{process_file, Recipe};
//! use dataprep::io::LoadOptions;
//!
//! let recipe = Recipe::from_file("recipe.json")?;
//! let (session, report) = process_file("people.csv".as_ref(), &LoadOptions::default(), &recipe)?;
//! println!("{} steps applied", report.applied);
//! print!("{}", session.generated_code());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success};
use crate::cache::LoadCache;
use crate::error::{PipelineError, PipelineResult};
use crate::io::LoadOptions;
use crate::session::Session;

use super::cleaning::{Axis, FillMethod};
use super::features::{CombineOp, ScaleMethod};
use super::operations::Operation;

/// Current recipe format version.
pub const RECIPE_VERSION: &str = "1.0";

fn default_version() -> String {
    RECIPE_VERSION.to_string()
}

/// An ordered list of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub steps: Vec<Operation>,
}

impl Recipe {
    pub fn new(steps: Vec<Operation>) -> Self {
        Self {
            version: default_version(),
            description: None,
            steps,
        }
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of [`run_recipe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub applied: usize,
    pub shape_before: (usize, usize),
    pub shape_after: (usize, usize),
}

/// Apply every step in order.
///
/// Stops at the first failing step; steps applied before it stay in the
/// session's table and history.
pub fn run_recipe(session: &mut Session, recipe: &Recipe) -> PipelineResult<RunReport> {
    let shape_before = session.require_table()?.shape();
    log_info(format!("⚙️  Running {} step(s)...", recipe.steps.len()));

    for (index, step) in recipe.steps.iter().enumerate() {
        session
            .apply(step)
            .map_err(|source| PipelineError::Step {
                index,
                operation: step.name().to_string(),
                source,
            })?;
        if let Some((rows, cols)) = session.shape() {
            log_info_indent(format!("[{}] {} → {}×{}", index + 1, step.name(), rows, cols), 1);
        }
    }

    let shape_after = session.require_table()?.shape();
    log_success(format!(
        "Applied {} step(s): {}×{} → {}×{}",
        recipe.steps.len(),
        shape_before.0,
        shape_before.1,
        shape_after.0,
        shape_after.1
    ));
    Ok(RunReport {
        applied: recipe.steps.len(),
        shape_before,
        shape_after,
    })
}

/// Load a file into a fresh session and run a recipe on it.
pub fn process_file(
    path: &Path,
    options: &LoadOptions,
    recipe: &Recipe,
) -> PipelineResult<(Session, RunReport)> {
    log_info(format!("📖 Reading {}...", path.display()));
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let cache = LoadCache::new();
    let mut session = Session::new();
    session.load(&cache, &file_name, &bytes, options)?;
    let report = run_recipe(&mut session, recipe)?;
    Ok((session, report))
}

/// A small recipe covering the common cleaning and feature steps.
pub fn example_recipe() -> Recipe {
    Recipe {
        version: default_version(),
        description: Some("Clean a customer table and derive model features".to_string()),
        steps: vec![
            Operation::DropDuplicates,
            Operation::FillMissing {
                column: "age".to_string(),
                method: FillMethod::Median,
                value: None,
            },
            Operation::DropMissing { axis: Axis::Rows },
            Operation::ClipOutliersIqr {
                column: "income".to_string(),
            },
            Operation::CombineColumns {
                left: "income".to_string(),
                right: Some("household".to_string()),
                op: CombineOp::Divide,
                constant: None,
            },
            Operation::Scale {
                column: "age".to_string(),
                method: ScaleMethod::Standard,
            },
            Operation::OneHotEncode {
                column: "city".to_string(),
            },
            Operation::ExtractDateFeatures {
                column: "signup".to_string(),
            },
        ],
    }
}
