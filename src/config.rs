//! Configuration management for html-validate.
//!
//! Handles:
//! - Command-line argument parsing
//! - Config file discovery and loading (`.htmlvalidate.toml`)
//! - Rule severity/options parsing
//! - Custom element metadata

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use thiserror::Error;

use crate::core::diagnostics::Severity;
use crate::elements::ElementDef;
use crate::rules;

/// File name looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = ".htmlvalidate.toml";

/// Errors that make a whole run impossible
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration in {source_name}: {message}")]
    InvalidFile { source_name: String, message: String },

    #[error("invalid element metadata in {source_name}: {message}")]
    InvalidMetadata { source_name: String, message: String },

    #[error("element '{element}' inherits unknown element '{base}'")]
    UnknownInherit { element: String, base: String },

    #[error("element inheritance cycle: {chain}")]
    InheritanceCycle { chain: String },

    #[error("rule '{rule}': invalid severity {value}")]
    InvalidSeverity { rule: String, value: String },

    #[error("rule '{rule}': invalid options at {path}: {message}")]
    InvalidOptions {
        rule: String,
        path: String,
        message: String,
    },

    #[error("unknown preset '{0}', expected 'recommended' or 'none'")]
    UnknownPreset(String),

    #[error("invalid rule override '{0}', expected <rule>=<severity>")]
    InvalidOverride(String),
}

/// Output format of the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Debug views of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    Tokens,
    Events,
    Tree,
}

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "html-validate")]
#[command(about = "Validate HTML documents against structural and content rules")]
#[command(version)]
pub struct Args {
    /// Files to validate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Explicit configuration file
    #[arg(short, long, help = "Configuration file (TOML)")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub formatter: OutputFormat,

    /// Rule overrides, e.g. `--rule no-inline-style=off`
    #[arg(long = "rule", value_name = "RULE=SEVERITY")]
    pub rules: Vec<String>,

    /// Print the token stream instead of validating
    #[arg(long, conflicts_with_all = ["dump_events", "dump_tree"])]
    pub dump_tokens: bool,

    /// Print the event stream instead of validating
    #[arg(long, conflicts_with = "dump_tree")]
    pub dump_events: bool,

    /// Print the document tree instead of validating
    #[arg(long)]
    pub dump_tree: bool,

    /// Log level for the validator
    #[arg(
        long,
        default_value = "warn",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

impl Args {
    /// Requested debug view, if any
    pub fn dump_mode(&self) -> Option<DumpMode> {
        if self.dump_tokens {
            Some(DumpMode::Tokens)
        } else if self.dump_events {
            Some(DumpMode::Events)
        } else if self.dump_tree {
            Some(DumpMode::Tree)
        } else {
            None
        }
    }
}

/// Configured severity and options of one rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSetting {
    pub severity: Severity,
    /// Raw options, validated when the rule is instantiated
    pub options: Option<toml::Value>,
}

impl RuleSetting {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            options: None,
        }
    }

    /// Parse `"error"`, `2`, `["warn"]` or `["warn", { ... }]`
    pub fn from_value(rule: &str, value: &toml::Value) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidSeverity {
            rule: rule.to_string(),
            value: value.to_string(),
        };

        match value {
            toml::Value::Integer(level) => Severity::from_level(*level)
                .map(Self::new)
                .ok_or_else(invalid),
            toml::Value::String(name) => name
                .parse::<Severity>()
                .map(Self::new)
                .map_err(|_| invalid()),
            toml::Value::Array(items) => {
                let mut setting = match items.first() {
                    Some(first @ (toml::Value::Integer(_) | toml::Value::String(_))) => {
                        Self::from_value(rule, first)?
                    }
                    _ => return Err(invalid()),
                };
                match items.get(1) {
                    Some(options @ toml::Value::Table(_)) => setting.options = Some(options.clone()),
                    Some(other) => {
                        return Err(ConfigError::InvalidOptions {
                            rule: rule.to_string(),
                            path: format!("rules.{}[1]", rule),
                            message: format!("expected a table, found {}", other.type_str()),
                        });
                    }
                    None => {}
                }
                if items.len() > 2 {
                    return Err(invalid());
                }
                Ok(setting)
            }
            _ => Err(invalid()),
        }
    }
}

/// Config file as written in TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub preset: Option<String>,
    #[serde(default)]
    pub rules: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub elements: BTreeMap<String, ElementDef>,
}

/// Combined configuration from all sources
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Rule id -> setting, in id order
    pub rules: BTreeMap<String, RuleSetting>,
    /// Custom element metadata merged over the built-in table
    pub elements: BTreeMap<String, ElementDef>,
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::recommended()
    }
}

impl Config {
    /// All built-in rules with their recommended severities
    pub fn recommended() -> Self {
        Self {
            rules: preset_rules("recommended").unwrap_or_default(),
            elements: BTreeMap::new(),
            config_path: None,
        }
    }

    /// No rules enabled
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
            elements: BTreeMap::new(),
            config_path: None,
        }
    }

    /// Create configuration from command-line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match Self::locate_config_file(args.config.as_deref()) {
            Some(path) => Self::load_file(&path)?,
            None => Self::recommended(),
        };

        for entry in &args.rules {
            config.apply_override(entry)?;
        }

        Ok(config)
    }

    /// Explicit path, else project file, else user config directory
    fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let project = PathBuf::from(PROJECT_CONFIG_FILE);
        if project.is_file() {
            return Some(project);
        }

        dirs::config_dir()
            .map(|dir| dir.join("html-validate").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Load and parse a config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&content, &path.display().to_string())?;
        config.config_path = Some(path.to_path_buf());
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str, source_name: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|err| ConfigError::InvalidFile {
            source_name: source_name.to_string(),
            message: err.to_string(),
        })?;

        let mut rules = preset_rules(file.preset.as_deref().unwrap_or("recommended"))?;
        for (id, value) in &file.rules {
            rules.insert(id.clone(), RuleSetting::from_value(id, value)?);
        }

        Ok(Self {
            rules,
            elements: file.elements,
            config_path: None,
        })
    }

    /// Apply a `rule=severity` override
    pub fn apply_override(&mut self, entry: &str) -> Result<(), ConfigError> {
        let (id, severity) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(entry.to_string()))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(ConfigError::InvalidOverride(entry.to_string()));
        }
        let severity = severity
            .parse::<Severity>()
            .map_err(|_| ConfigError::InvalidSeverity {
                rule: id.to_string(),
                value: severity.to_string(),
            })?;

        self.rules
            .entry(id.to_string())
            .and_modify(|setting| setting.severity = severity)
            .or_insert_with(|| RuleSetting::new(severity));
        Ok(())
    }

    /// Set a rule directly (useful for embedding and tests)
    pub fn with_rule(mut self, id: &str, severity: Severity) -> Self {
        self.rules.insert(id.to_string(), RuleSetting::new(severity));
        self
    }

    /// Set a rule with options
    pub fn with_rule_options(mut self, id: &str, severity: Severity, options: toml::Value) -> Self {
        self.rules.insert(
            id.to_string(),
            RuleSetting {
                severity,
                options: Some(options),
            },
        );
        self
    }

    /// Add a custom element definition
    pub fn with_element(mut self, tag_name: &str, def: ElementDef) -> Self {
        self.elements.insert(tag_name.to_string(), def);
        self
    }

    pub fn severity_of(&self, rule: &str) -> Severity {
        self.rules
            .get(rule)
            .map(|setting| setting.severity)
            .unwrap_or(Severity::Disabled)
    }
}

fn preset_rules(name: &str) -> Result<BTreeMap<String, RuleSetting>, ConfigError> {
    match name {
        "recommended" => Ok(rules::RECOMMENDED
            .iter()
            .map(|(id, severity)| (id.to_string(), RuleSetting::new(*severity)))
            .collect()),
        "none" => Ok(BTreeMap::new()),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}
