//! Project id resolution.
//!
//! The Firestore project is found by consulting an ordered list of sources and
//! taking the first one that yields a non-empty value:
//!
//! 1. `GOOGLE_CLOUD_PROJECT`, `FIREBASE_PROJECT_ID`, `GCLOUD_PROJECT`
//! 2. `gcloud config get-value project`
//! 3. `firebase.json` / `.firebaserc` (`projects.default`) in the working
//!    directory or one of its ancestors
//!
//! Individual sources never fail; an error in any of them just means
//! "try the next one".

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::process::Command;
use tracing::debug;

/// Environment variables consulted, highest priority first.
pub const PROJECT_ENV_VARS: [&str; 3] = ["GOOGLE_CLOUD_PROJECT", "FIREBASE_PROJECT_ID", "GCLOUD_PROJECT"];

/// Config file names checked in each directory, highest priority first.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["firebase.json", ".firebaserc"];

/// Number of directories searched, counting the start directory.
pub const MAX_SEARCH_DEPTH: usize = 10;

const GCLOUD_TIMEOUT: Duration = Duration::from_secs(5);

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A place a project id can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSource {
    /// An environment variable.
    Env(&'static str),
    /// The gcloud CLI's configured default project.
    GcloudCli,
    /// A Firebase config file in the working directory or an ancestor.
    ConfigFile,
}

impl ProjectSource {
    /// All sources in the order they are consulted.
    pub const ALL: [ProjectSource; 5] = [
        ProjectSource::Env(PROJECT_ENV_VARS[0]),
        ProjectSource::Env(PROJECT_ENV_VARS[1]),
        ProjectSource::Env(PROJECT_ENV_VARS[2]),
        ProjectSource::GcloudCli,
        ProjectSource::ConfigFile,
    ];
}

impl fmt::Display for ProjectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectSource::Env(name) => write!(f, "environment variable {}", name),
            ProjectSource::GcloudCli => f.write_str("`gcloud config get-value project`"),
            ProjectSource::ConfigFile => write!(
                f,
                "{} or {} (projects.default) in the working directory and up to {} parents",
                CONFIG_FILE_NAMES[0],
                CONFIG_FILE_NAMES[1],
                MAX_SEARCH_DEPTH - 1
            ),
        }
    }
}

/// The project id this process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProjectId {
    value: String,
    source: ProjectSource,
    config_path: Option<PathBuf>,
}

impl ResolvedProjectId {
    /// Build a resolved id by hand, e.g. for tests or embedding.
    pub fn new(value: impl Into<String>, source: ProjectSource) -> Self {
        Self {
            value: value.into(),
            source,
            config_path: None,
        }
    }

    /// The project id.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Which source produced it.
    pub fn source(&self) -> ProjectSource {
        self.source
    }

    /// The config file it was read from, for `ProjectSource::ConfigFile`.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

impl fmt::Display for ResolvedProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// An external command whose stdout names the project.
#[derive(Debug, Clone)]
pub struct CliQuery {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliQuery {
    /// `gcloud config get-value project`.
    pub fn gcloud() -> Self {
        Self::new("gcloud", ["config", "get-value", "project"])
    }

    /// An arbitrary command.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: GCLOUD_TIMEOUT,
        }
    }

    /// Override how long the command may run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command; any failure is `None`.
    pub async fn run(&self) -> Option<String> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(program = %self.program, error = %e, "project query command failed to start");
                return None;
            }
            Err(_) => {
                debug!(program = %self.program, "project query command timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(program = %self.program, status = %output.status, "project query command failed");
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .filter(|line| *line != "(unset)")
            .map(str::to_string)
    }
}

/// Finds the project id by walking the configured sources in priority order.
pub struct ProjectResolver {
    env: EnvLookup,
    start_dir: Option<PathBuf>,
    cli: Option<CliQuery>,
}

impl ProjectResolver {
    /// A resolver reading the real process environment, working directory and gcloud.
    pub fn from_process() -> Self {
        Self {
            env: Box::new(|key| std::env::var(key).ok()),
            start_dir: std::env::current_dir().ok(),
            cli: Some(CliQuery::gcloud()),
        }
    }

    /// An isolated resolver: empty environment, no CLI, config search from `start_dir`.
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            env: Box::new(|_| None),
            start_dir: Some(start_dir.into()),
            cli: None,
        }
    }

    /// Replace the environment lookup.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Replace the CLI query.
    pub fn with_cli(mut self, cli: CliQuery) -> Self {
        self.cli = Some(cli);
        self
    }

    /// Skip the CLI source entirely.
    pub fn without_cli(mut self) -> Self {
        self.cli = None;
        self
    }

    /// Try every source in order; `None` when none of them yields a value.
    pub async fn resolve(&self) -> Option<ResolvedProjectId> {
        for source in ProjectSource::ALL {
            let found = match source {
                ProjectSource::Env(name) => (self.env)(name)
                    .and_then(non_empty)
                    .map(|value| (value, None)),
                ProjectSource::GcloudCli => match &self.cli {
                    Some(cli) => cli.run().await.map(|value| (value, None)),
                    None => None,
                },
                ProjectSource::ConfigFile => self
                    .start_dir
                    .as_deref()
                    .and_then(find_in_ancestors)
                    .map(|(value, path)| (value, Some(path))),
            };

            match found {
                Some((value, config_path)) => {
                    debug!(source = %source, project_id = %value, "resolved project id");
                    return Some(ResolvedProjectId {
                        value,
                        source,
                        config_path,
                    });
                }
                None => debug!(source = %source, "no project id"),
            }
        }
        None
    }
}

/// Search `start` and its ancestors (at most `MAX_SEARCH_DEPTH` directories in total)
/// for a Firebase config file naming a default project.
pub fn find_in_ancestors(start: &Path) -> Option<(String, PathBuf)> {
    let mut dir = Some(start);
    for _ in 0..MAX_SEARCH_DEPTH {
        let current = dir?;
        for name in CONFIG_FILE_NAMES {
            let path = current.join(name);
            if let Some(project) = read_default_project(&path) {
                return Some((project, path));
            }
        }
        dir = current.parent();
    }
    None
}

/// Read `projects.default` from a Firebase config file.
///
/// Missing, unreadable or malformed files all read as `None`.
pub fn read_default_project(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let json: JsonValue = match serde_json::from_str(&contents) {
        Ok(json) => json,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring malformed config file");
            return None;
        }
    };
    json.pointer("/projects/default")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
