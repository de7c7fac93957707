use std::path::Path;
use tracing::debug;

use crate::spec::error::{Result, SpecError};
use crate::spec::validator::SpecValidator;
use crate::types::StackSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Yaml,
    Json,
}

impl SpecFormat {
    /// JSON for `.json`, YAML for everything else
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => SpecFormat::Json,
            _ => SpecFormat::Yaml,
        }
    }
}

/// Reads a spec file and runs the validator over it
pub struct SpecLoader {
    validator: SpecValidator,
}

impl SpecLoader {
    pub fn new() -> Self {
        Self {
            validator: SpecValidator::new(),
        }
    }

    pub fn load(&self, path: &Path) -> Result<StackSpec> {
        let content = std::fs::read_to_string(path).map_err(|e| SpecError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let format = SpecFormat::from_path(path);
        debug!("Loading {:?} spec from {}", format, path.display());

        let spec = Self::parse(&content, format).map_err(|reason| SpecError::Parse {
            path: path.display().to_string(),
            reason,
        })?;
        self.validator.validate(&spec)?;
        Ok(spec)
    }

    pub fn load_str(&self, content: &str, format: SpecFormat) -> Result<StackSpec> {
        let spec = Self::parse(content, format).map_err(|reason| SpecError::Parse {
            path: "<inline>".to_string(),
            reason,
        })?;
        self.validator.validate(&spec)?;
        Ok(spec)
    }

    fn parse(content: &str, format: SpecFormat) -> std::result::Result<StackSpec, String> {
        match format {
            SpecFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            SpecFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

impl Default for SpecLoader {
    fn default() -> Self {
        Self::new()
    }
}
