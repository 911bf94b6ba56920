//! The deployment sequence run for every accepted trigger.
//!
//! Steps run strictly in order: cleanup, clone, bump-version, build, stage,
//! commit, push, publish. The first step that fails aborts the run; nothing
//! is rolled back. External programs go through [`CommandRunner`] so the
//! sequence can be exercised without git or a package index.

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{CdError, Result};
use crate::rewrite::{rewrite_metadata_file, Rewrite};
use crate::version::Version;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Cleanup,
    Clone,
    BumpVersion,
    Build,
    Stage,
    Commit,
    Push,
    Publish,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::Cleanup,
        Step::Clone,
        Step::BumpVersion,
        Step::Build,
        Step::Stage,
        Step::Commit,
        Step::Push,
        Step::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Cleanup => "cleanup",
            Step::Clone => "clone",
            Step::BumpVersion => "bump-version",
            Step::Build => "build",
            Step::Stage => "stage",
            Step::Commit => "commit",
            Step::Push => "push",
            Step::Publish => "publish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// An external program invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    /// Build from a configured argv; the first element is the program.
    pub fn from_argv(step: Step, argv: &[String], cwd: &Path) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| CdError::StepSpawnFailed {
            step: step.to_string(),
            message: "empty command".into(),
        })?;
        Ok(Self::new(program.clone(), cwd).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program and arguments joined for logs. Environment values are omitted.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env", &env_keys)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Executes external programs for the pipeline.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes of this server.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn resolve(program: &str) -> Result<PathBuf> {
        // Paths are used as given; bare names are looked up on PATH.
        if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
            return Ok(PathBuf::from(program));
        }
        which::which(program).map_err(|_| CdError::ToolNotFound(program.to_string()))
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let program = Self::resolve(&command.program)?;
        let output = Command::new(program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    /// `None` for steps performed in-process.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub run_id: Uuid,
    pub previous_version: Version,
    pub new_version: Version,
    pub steps: Vec<StepRecord>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl Pipeline {
    pub fn new(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<DeployReport> {
        self.run_with_id(Uuid::new_v4())
    }

    pub fn run_with_id(&self, run_id: Uuid) -> Result<DeployReport> {
        let span = tracing::info_span!("deploy", %run_id);
        let _enter = span.enter();

        // Credentials are read first so a broken file fails before any side effect.
        let credentials = Credentials::load(&self.config.credentials_file)?;

        let repo = &self.config.repository;
        let package = &self.config.package;
        let commands = &self.config.commands;
        let checkout = self.config.checkout_path();
        let mut steps = Vec::with_capacity(Step::ALL.len());

        self.in_process(Step::Cleanup, &mut steps, || {
            crate::io::remove_dir_if_exists(&checkout)?;
            std::fs::create_dir_all(&repo.workspace)?;
            Ok(())
        })?;

        let clone = CommandSpec::new("git", &repo.workspace)
            .args(["clone", "--branch", repo.branch.as_str(), repo.url.as_str()])
            .arg(repo.checkout_dir.to_string_lossy());
        self.external(Step::Clone, &mut steps, &clone)?;

        let metadata = checkout.join(&package.metadata_file);
        let Rewrite { previous, next, .. } = self.in_process(Step::BumpVersion, &mut steps, || {
            rewrite_metadata_file(&metadata, &package.name)
        })?;
        tracing::info!(from = %previous, to = %next, "bumped package version");

        let build = CommandSpec::from_argv(Step::Build, &commands.build, &checkout)?;
        self.external(Step::Build, &mut steps, &build)?;

        let stage = CommandSpec::new("git", &checkout)
            .arg("add")
            .arg(package.metadata_file.to_string_lossy())
            .arg(package.dist_dir.to_string_lossy());
        self.external(Step::Stage, &mut steps, &stage)?;

        let commit = CommandSpec::new("git", &checkout).args([
            "commit",
            "-m",
            commands.commit_message.as_str(),
        ]);
        self.external(Step::Commit, &mut steps, &commit)?;

        let push = CommandSpec::new("git", &checkout).args([
            "push",
            repo.remote.as_str(),
            repo.branch.as_str(),
        ]);
        self.external(Step::Push, &mut steps, &push)?;

        let dists = distribution_files(&checkout, &package.dist_dir, &next)?;
        let publish = CommandSpec::from_argv(Step::Publish, &commands.publish, &checkout)?
            .args(dists)
            .env("TWINE_USERNAME", credentials.username.as_str())
            .env("TWINE_PASSWORD", credentials.password.as_str());
        self.external(Step::Publish, &mut steps, &publish)?;

        tracing::info!(version = %next, "deployment finished");
        Ok(DeployReport {
            run_id,
            previous_version: previous,
            new_version: next,
            steps,
        })
    }

    fn in_process<T>(
        &self,
        step: Step,
        steps: &mut Vec<StepRecord>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        tracing::info!(%step, "step started");
        let start = Instant::now();
        let result = f();
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                tracing::info!(%step, duration_ms, "step finished");
                steps.push(StepRecord {
                    step,
                    exit_code: None,
                    duration_ms,
                });
            }
            Err(e) => tracing::error!(%step, duration_ms, error = %e, "step failed"),
        }
        result
    }

    fn external(
        &self,
        step: Step,
        steps: &mut Vec<StepRecord>,
        command: &CommandSpec,
    ) -> Result<()> {
        tracing::info!(%step, command = %command.command_line(), "step started");
        let start = Instant::now();

        let output = self.runner.run(command).map_err(|e| match e {
            CdError::ToolNotFound(_) => e,
            other => CdError::StepSpawnFailed {
                step: step.to_string(),
                message: other.to_string(),
            },
        });
        let duration_ms = start.elapsed().as_millis() as u64;
        let output = match output {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(%step, error = %e, "step could not be started");
                return Err(e);
            }
        };

        if !output.stdout.trim().is_empty() {
            tracing::debug!(%step, stdout = %output.stdout.trim_end());
        }
        if !output.success() {
            tracing::error!(
                %step,
                code = output.code,
                duration_ms,
                stderr = %output.stderr.trim_end(),
                "step failed"
            );
            return Err(CdError::StepFailed {
                step: step.to_string(),
                code: output.code,
            });
        }

        tracing::info!(%step, code = output.code, duration_ms, "step finished");
        steps.push(StepRecord {
            step,
            exit_code: Some(output.code),
            duration_ms,
        });
        Ok(())
    }
}

/// Files in `<checkout>/<dist_dir>` built for `version`, as paths relative to
/// the checkout, sorted by name.
pub fn distribution_files(
    checkout: &Path,
    dist_dir: &Path,
    version: &Version,
) -> Result<Vec<String>> {
    let dir = checkout.join(dist_dir);
    let sdist_marker = format!("-{version}.");
    let wheel_marker = format!("-{version}-");

    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(&sdist_marker) || name.contains(&wheel_marker) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return Err(CdError::NoDistributions {
            version: version.to_string(),
            dir,
        });
    }
    names.sort();

    Ok(names
        .into_iter()
        .map(|n| dist_dir.join(n).to_string_lossy().into_owned())
        .collect())
}
