//! Layered config: defaults, the nearest `mockgen.toml`, `--config`, then `MOCKGEN_*` variables.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOCAL_CONFIG: &str = "mockgen.toml";
pub const ENV_PREFIX: &str = "MOCKGEN_";

pub const DEFAULT_MOCK_FILE_HPP: &str = "{interface}Mock.hpp";

pub const DEFAULT_FILE_TEMPLATE_HPP: &str = r#"#ifndef {guard}
#define {guard}

#include <gmock/gmock.h>
#include "{file}"

{namespaces_begin}

{template}class {interface}Mock : public {template_interface}
{
public:
{mock_methods}
};

{namespaces_end}

#endif // {guard}
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Configuration file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// File name of the generated header, e.g. `{interface}Mock.hpp`.
    pub mock_file_hpp: String,
    /// Body of the generated header. Empty means no header is written.
    pub file_template_hpp: String,
    pub mock_file_cpp: String,
    /// Body of the generated source file. Empty means no source file.
    pub file_template_cpp: String,
    /// Conditional-compilation symbols defined for every unit.
    pub defines: Vec<String>,
    /// Header extensions picked up when walking directories.
    pub extensions: Vec<String>,
    /// Glob patterns of paths skipped when walking directories.
    pub exclude: Vec<String>,
    /// Also mock virtual methods that already have an implementation.
    pub mock_overridable: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mock_file_hpp: DEFAULT_MOCK_FILE_HPP.to_string(),
            file_template_hpp: DEFAULT_FILE_TEMPLATE_HPP.to_string(),
            mock_file_cpp: String::new(),
            file_template_cpp: String::new(),
            defines: Vec::new(),
            extensions: ["hpp", "h", "hh", "hxx"].iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            mock_overridable: false,
        }
    }
}

impl GeneratorConfig {
    /// Load and validate the configuration, layering `explicit` (the
    /// `--config` file) above `mockgen.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
        }
        let config: Self = Self::figment(explicit).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the provider chain without extracting it.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        figment = figment.merge(Toml::file(LOCAL_CONFIG));
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.file_template_hpp.is_empty() && self.mock_file_hpp.trim().is_empty() {
            return Err(invalid("mock_file_hpp", "must name a file when file_template_hpp is set"));
        }
        if !self.file_template_cpp.is_empty() && self.mock_file_cpp.trim().is_empty() {
            return Err(invalid("mock_file_cpp", "must name a file when file_template_cpp is set"));
        }
        if self.extensions.is_empty() {
            return Err(invalid("extensions", "at least one header extension is required"));
        }
        if let Some(ext) = self.extensions.iter().find(|e| e.starts_with('.') || e.is_empty()) {
            return Err(invalid("extensions", &format!("`{ext}` must be a bare extension like `hpp`")));
        }
        for pattern in &self.exclude {
            Glob::new(pattern).map_err(|err| invalid("exclude", &err.to_string()))?;
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
