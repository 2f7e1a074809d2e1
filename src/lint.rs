use crate::{
    analysis::{analyze, report::Report},
    diagnostics::emit_load_error,
    project::{
        config::{Config, ConfigError, OutputFormat},
        package::{load_program, LoadError},
    },
};
use miette::Diagnostic;
use notify::{Config as WatchConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    time::Duration,
};
use thiserror::Error;

/// Command-line settings that take precedence over `immutable.toml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub format: Option<OutputFormat>,
    pub jobs: Option<usize>,
    pub exempt: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LintOptions {
    pub pattern: String,
    pub cwd: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub watch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Findings(usize),
    Fatal,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Clean => 0,
            Outcome::Findings(_) => 1,
            Outcome::Fatal => 2,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum LintError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to render findings: {0}")]
    #[diagnostic(code(go_immutable::render))]
    Render(#[from] serde_json::Error),
    #[error("failed to write findings: {0}")]
    #[diagnostic(code(go_immutable::output))]
    Output(#[from] io::Error),
    #[error("file watcher failed: {0}")]
    #[diagnostic(code(go_immutable::watch))]
    Watch(#[from] notify::Error),
}

pub fn run_lint(options: &LintOptions) -> Outcome {
    let outcome = report_outcome(run_single_check(options));
    if !options.watch {
        return outcome;
    }
    match watch(options) {
        Ok(()) => outcome,
        Err(err) => report_outcome(Err(err)),
    }
}

fn report_outcome(result: Result<Report, LintError>) -> Outcome {
    match result {
        Ok(report) if report.is_clean() => Outcome::Clean,
        Ok(report) => Outcome::Findings(report.count()),
        Err(LintError::Load(err)) => {
            emit_load_error(err);
            Outcome::Fatal
        }
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            Outcome::Fatal
        }
    }
}

/// Loads the configuration, runs one analysis and writes the findings.
pub fn run_single_check(options: &LintOptions) -> Result<Report, LintError> {
    let config = resolve_config(options)?;
    let program = load_program(&options.pattern, &options.cwd)?;
    let report = analyze(&program, &config);
    let rendered = report.render(config.format, &program)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(report)
}

pub fn resolve_config(options: &LintOptions) -> Result<Config, ConfigError> {
    let start = target_dir(&options.pattern, &options.cwd);
    let mut config = Config::discover(&start, options.config.as_deref())?;
    if let Some(source) = &config.source {
        tracing::debug!(config = %source.display(), "loaded configuration");
    }
    let overrides = &options.overrides;
    if let Some(format) = overrides.format {
        config.format = format;
    }
    if let Some(jobs) = overrides.jobs {
        config.jobs = jobs;
    }
    config.exempt.extend(overrides.exempt.iter().cloned());
    Ok(config)
}

/// Directory a pattern starts from, used for configuration discovery and
/// watching. Import-path patterns fall back to `cwd`.
pub fn target_dir(pattern: &str, cwd: &Path) -> PathBuf {
    let base = pattern.strip_suffix("...").unwrap_or(pattern);
    let base = base.strip_suffix('/').unwrap_or(base);
    let dir = cwd.join(if base.is_empty() { "." } else { base });
    if dir.is_dir() {
        dir
    } else {
        cwd.to_path_buf()
    }
}

fn watch(options: &LintOptions) -> Result<(), LintError> {
    let root = target_dir(&options.pattern, &options.cwd);
    let (tx, rx) = mpsc::channel();
    let mut watcher = build_watcher(tx)?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    eprintln!(
        "Watching {} for changes. Press Ctrl+C to stop…",
        root.display()
    );

    for event in rx {
        match event {
            Ok(evt) => {
                let relevant = matches!(
                    evt.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) && evt.paths.iter().any(|path| is_watched_file(path));
                if relevant {
                    tracing::info!(paths = evt.paths.len(), "change detected; re-running");
                    report_outcome(run_single_check(options));
                }
            }
            Err(err) => tracing::warn!(%err, "watch error"),
        }
    }
    Ok(())
}

fn is_watched_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.ends_with(".go")
        || name == crate::project::gomod::GO_MOD
        || name == crate::project::config::CONFIG_FILE
}

fn build_watcher(
    tx: mpsc::Sender<Result<notify::Event, notify::Error>>,
) -> notify::Result<RecommendedWatcher> {
    notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map(|mut watcher| {
        watcher
            .configure(WatchConfig::default().with_poll_interval(Duration::from_millis(200)))
            .ok();
        watcher
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cli_overrides_win_over_the_config_file() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("immutable.toml"),
            "[naming]\nexempt = [\"err\"]\n[output]\nformat = \"json\"\n",
        )
        .expect("write config");
        let options = LintOptions {
            pattern: "./...".to_string(),
            cwd: dir.path().to_path_buf(),
            config: None,
            overrides: Overrides {
                format: Some(OutputFormat::Plain),
                jobs: Some(3),
                exempt: vec!["ok".to_string()],
            },
            watch: false,
        };
        let config = resolve_config(&options).expect("config");
        assert_eq!(config.format, OutputFormat::Plain);
        assert_eq!(config.jobs, 3);
        assert!(config.exempt.contains("err"));
        assert!(config.exempt.contains("ok"));
    }

    #[test]
    fn watched_files_are_go_sources_and_manifests() {
        assert!(is_watched_file(Path::new("/x/main.go")));
        assert!(is_watched_file(Path::new("/x/go.mod")));
        assert!(is_watched_file(Path::new("/x/immutable.toml")));
        assert!(!is_watched_file(Path::new("/x/README.md")));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Outcome::Clean.exit_code(), 0);
        assert_eq!(Outcome::Findings(3).exit_code(), 1);
        assert_eq!(Outcome::Fatal.exit_code(), 2);
    }
}
