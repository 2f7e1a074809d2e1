use miette::Diagnostic;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const CONFIG_FILE: &str = "immutable.toml";
pub const DEFAULT_MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    Fancy,
    Json,
}

impl OutputFormat {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "plain" | "text" => Some(Self::Plain),
            "fancy" | "pretty" => Some(Self::Fancy),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Names excluded from every naming check on top of `_`.
    pub exempt: BTreeSet<String>,
    /// Checker worker threads; `0` means available parallelism.
    pub jobs: usize,
    pub max_depth: usize,
    pub format: OutputFormat,
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exempt: BTreeSet::new(),
            jobs: 1,
            max_depth: DEFAULT_MAX_DEPTH,
            format: OutputFormat::Plain,
            source: None,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {}: {error}", .path.display())]
    #[diagnostic(code(go_immutable::config::io))]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to parse {}: {message}", .path.display())]
    #[diagnostic(
        code(go_immutable::config::parse),
        help("see the [naming], [analysis] and [output] tables in the README")
    )]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    naming: RawNaming,
    #[serde(default)]
    analysis: RawAnalysis,
    #[serde(default)]
    output: RawOutput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNaming {
    #[serde(default)]
    exempt: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAnalysis {
    jobs: Option<usize>,
    #[serde(alias = "max-depth")]
    max_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOutput {
    format: Option<OutputFormat>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let mut config = Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        let raw: RawConfig = toml::from_str(text).map_err(|err| err.to_string())?;
        let defaults = Config::default();
        Ok(Self {
            exempt: raw.naming.exempt.into_iter().collect(),
            jobs: raw.analysis.jobs.unwrap_or(defaults.jobs),
            max_depth: raw.analysis.max_depth.unwrap_or(defaults.max_depth),
            format: raw.output.format.unwrap_or(defaults.format),
            source: None,
        })
    }

    /// Loads `explicit` if given, else the nearest `immutable.toml` above
    /// `start`, else the defaults.
    pub fn discover(start: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match find_config(start) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml("").expect("parse");
        assert_eq!(config, Config::default());
        assert!(config.exempt.is_empty());
    }

    #[test]
    fn reads_every_table() {
        let config = Config::from_toml(
            r#"
[naming]
exempt = ["err", "ok"]

[analysis]
jobs = 4
max-depth = 64

[output]
format = "json"
"#,
        )
        .expect("parse");
        assert!(config.exempt.contains("err"));
        assert!(config.exempt.contains("ok"));
        assert_eq!(config.jobs, 4);
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Config::from_toml("[naming]\nprefixes = [\"m\"]\n").expect_err("unknown key");
        assert!(err.contains("prefixes"));
    }

    #[test]
    fn discovers_config_in_parent() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[naming]\nexempt = [\"err\"]\n",
        )
        .expect("write config");
        let nested = dir.path().join("pkg");
        fs::create_dir_all(&nested).expect("mkdir");
        let config = Config::discover(&nested, None).expect("discover");
        assert!(config.exempt.contains("err"));
        assert_eq!(config.source, Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn output_format_parse() {
        assert_eq!(OutputFormat::parse("PLAIN"), Some(OutputFormat::Plain));
        assert_eq!(OutputFormat::parse("fancy"), Some(OutputFormat::Fancy));
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("xml"), None);
    }
}
