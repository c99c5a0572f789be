//! Run definition loader
//!
//! Load user-supplied run definitions from YAML files or a directory of them.

use std::path::Path;

use super::config::CONFIG_FILE;
use super::definition::RunDefinition;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("Invalid run definition in {file}: {message}")]
    Invalid { file: String, message: String },

    #[error("Invalid configuration in {file}: {message}")]
    Config { file: String, message: String },
}

pub struct DefinitionLoader;

impl DefinitionLoader {
    pub fn load_directory(dir: &Path) -> Result<Vec<RunDefinition>, LoadError> {
        let mut definitions = Vec::new();

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let ext = path.extension().and_then(|e| e.to_str());
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

            // The runner config may sit next to the definitions
            if filename == CONFIG_FILE || filename == "yematch.yml" {
                continue;
            }

            if ext == Some("yaml") || ext == Some("yml") {
                definitions.push(Self::load_file(&path)?);
            }
        }

        Ok(definitions)
    }

    pub fn load_file(path: &Path) -> Result<RunDefinition, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let file = path.display().to_string();
        let definition: RunDefinition =
            serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
                file: file.clone(),
                error: e,
            })?;

        if definition.name.trim().is_empty() {
            return Err(LoadError::Invalid {
                file,
                message: "name must not be empty".to_string(),
            });
        }
        if definition.activities.is_empty() {
            return Err(LoadError::Invalid {
                file,
                message: format!("'{}' lists no activities", definition.name),
            });
        }
        Ok(definition)
    }
}
