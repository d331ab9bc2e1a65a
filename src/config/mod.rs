//! Layered ambient configuration.
//!
//! Three layers, least to most authoritative: a project-local
//! `promptloom.json` (checked into version control, holds `configs_root`),
//! a user-global `~/.promptloom/config.json` (holds `default_backend_url`
//! and `output_root`), and environment variables for CI use. Each layer
//! only overrides the fields it actually sets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PromptloomError;

const PROJECT_CONFIG_FILE: &str = "promptloom.json";
const GLOBAL_CONFIG_DIR: &str = ".promptloom";
const GLOBAL_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectConfig {
    configs_root: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalConfig {
    default_backend_url: Option<String>,
    output_root: Option<PathBuf>,
}

/// The effective configuration after layering project, global, and
/// environment sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Where theme/variation-set source files live, if the project
    /// declares a shared root for them.
    pub configs_root: Option<PathBuf>,
    /// Default image-backend URL for the (out-of-scope) HTTP client.
    pub default_backend_url: Option<String>,
    /// Default output directory for the (out-of-scope) manifest writer.
    pub output_root: Option<PathBuf>,
}

impl Config {
    /// Load and layer configuration, starting from `project_dir` (normally
    /// the current working directory).
    pub fn load(project_dir: &Path) -> Result<Self, PromptloomError> {
        let mut config = Self::default();

        if let Some(project) = read_json::<ProjectConfig>(&project_dir.join(PROJECT_CONFIG_FILE))? {
            config.configs_root = project.configs_root.map(|p| project_dir.join(p));
        }

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE);
            if let Some(global) = read_json::<GlobalConfig>(&global_path)? {
                if let Some(url) = global.default_backend_url {
                    config.default_backend_url = Some(url);
                }
                if let Some(root) = global.output_root {
                    config.output_root = Some(root);
                }
            }
        }

        if let Ok(value) = std::env::var("PROMPTLOOM_CONFIGS_ROOT") {
            config.configs_root = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("PROMPTLOOM_BACKEND_URL") {
            config.default_backend_url = Some(value);
        }
        if let Ok(value) = std::env::var("PROMPTLOOM_OUTPUT_ROOT") {
            config.output_root = Some(PathBuf::from(value));
        }

        Ok(config)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, PromptloomError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(PromptloomError::Io)?;
    let value = serde_json::from_str(&text).map_err(|e| PromptloomError::MalformedSource {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(Some(value))
}
