mod resolver;

use std::{
    ffi::OsString,
    path::Path,
};

use log::{debug, error, info};

use crate::{
    command::{CommandError, CommandRunner, Invocation, Lines, ProcessRunner},
    model::ResolvedCommit,
    provider::{ensure_vacant, ContentProvider, FetchError, Progress},
};

pub use resolver::ReferenceResolver;

/// Variables that would point git at a repository other than the one being worked on.
const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// The git client binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCli {
    program: OsString,
}

impl GitCli {
    pub fn new(program: impl Into<OsString>) -> Self {
        GitCli {
            program: program.into(),
        }
    }

    pub fn command(&self) -> Invocation {
        GIT_ENV_OVERRIDES
            .iter()
            .fold(Invocation::new(self.program.clone()), |invocation, key| {
                invocation.env_remove(*key)
            })
    }

    pub fn in_dir(&self, dir: &Path) -> Invocation {
        self.command().current_dir(dir)
    }
}

impl Default for GitCli {
    fn default() -> Self {
        GitCli::new("git")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSpec {
    pub repo: String,
    pub reference: Option<String>,
}

/// Clones git repositories, optionally pinned to a reference.
pub struct GitProvider {
    git: GitCli,
    runner: Box<dyn CommandRunner>,
}

impl std::fmt::Debug for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitProvider")
            .field("git", &self.git)
            .finish_non_exhaustive()
    }
}

impl Default for GitProvider {
    fn default() -> Self {
        GitProvider::new(GitCli::default())
    }
}

impl GitProvider {
    pub const NAME: &'static str = "git";

    pub fn new(git: GitCli) -> Self {
        GitProvider::with_runner(git, ProcessRunner)
    }

    pub fn with_runner(git: GitCli, runner: impl CommandRunner + 'static) -> Self {
        GitProvider {
            git,
            runner: Box::new(runner),
        }
    }

    fn clone_invocation(&self, spec: &GitSpec, output_dir: &Path) -> Invocation {
        let mut clone = self.git.command().args(["clone", "--recursive"]);
        // Without a reference the tip of the default branch is all that is needed.
        if spec.reference.is_none() {
            clone = clone.args(["--depth", "1"]);
        }
        clone
            .arg("--")
            .arg(spec.repo.as_str())
            .arg(output_dir.as_os_str())
    }
}

impl ContentProvider for GitProvider {
    type Spec = GitSpec;

    /// Always matches: whatever no other provider recognizes is assumed to be a git URL or a
    /// local repository. A bad source only shows up when `fetch` fails.
    fn detect(&self, source: &str, reference: Option<&str>) -> Option<GitSpec> {
        Some(GitSpec {
            repo: source.to_owned(),
            reference: reference.map(str::to_owned),
        })
    }

    fn fetch<'a>(
        &'a self,
        spec: &'a GitSpec,
        output_dir: &'a Path,
        yield_output: bool,
    ) -> Result<Progress<'a>, FetchError> {
        ensure_vacant(output_dir)?;
        info!(
            "Cloning {}{} into {}",
            spec.repo,
            spec.reference
                .as_deref()
                .map(|reference| format!(" at {reference}"))
                .unwrap_or_default(),
            output_dir.display()
        );

        Ok(Box::new(GitFetch {
            provider: self,
            spec,
            output_dir,
            capture: yield_output,
            phase: Phase::Clone,
        }))
    }

    fn content_id(&self, _spec: &GitSpec, output_dir: &Path) -> Result<Option<String>, FetchError> {
        let head = self
            .runner
            .output(&self.git.in_dir(output_dir).args(["rev-parse", "HEAD"]))?;
        let commit: ResolvedCommit = head.parse()?;
        Ok(Some(commit.to_string()))
    }
}

enum Phase<'a> {
    Clone,
    Cloning(Lines),
    Checkout(&'a str),
    Resetting(Lines),
    Submodules,
    UpdatingSubmodules(Lines),
    Done,
}

type Step<'a> = (Phase<'a>, Option<Result<String, FetchError>>);

/// Lazily runs clone, then (with a reference) resolve, reset and submodule update.
struct GitFetch<'a> {
    provider: &'a GitProvider,
    spec: &'a GitSpec,
    output_dir: &'a Path,
    capture: bool,
    phase: Phase<'a>,
}

impl<'a> GitFetch<'a> {
    fn start_clone(&self) -> Step<'a> {
        let clone = self.provider.clone_invocation(self.spec, self.output_dir);
        match self.provider.runner.run(&clone, self.capture) {
            Ok(lines) => (Phase::Cloning(lines), None),
            Err(error) => (Phase::Done, Some(Err(self.clone_failed(error)))),
        }
    }

    fn cloning(&self, mut lines: Lines) -> Step<'a> {
        let spec: &'a GitSpec = self.spec;
        match (lines.next(), spec.reference.as_deref()) {
            (Some(Ok(line)), _) => (Phase::Cloning(lines), Some(Ok(line))),
            (Some(Err(error)), _) => (Phase::Done, Some(Err(self.clone_failed(error)))),
            (None, Some(reference)) => (Phase::Checkout(reference), None),
            (None, None) => {
                debug!("Cloned {} at the default branch", self.spec.repo);
                (Phase::Done, None)
            }
        }
    }

    fn clone_failed(&self, error: CommandError) -> FetchError {
        FetchError::FetchFailed {
            repo: self.spec.repo.clone(),
            error,
        }
    }

    fn checkout(&self, reference: &str) -> Step<'a> {
        match self.reset_to_reference(reference) {
            Ok(lines) => (Phase::Resetting(lines), None),
            Err(error) => (Phase::Done, Some(Err(error))),
        }
    }

    fn reset_to_reference(&self, reference: &str) -> Result<Lines, FetchError> {
        let resolver = ReferenceResolver::new(&self.provider.git, self.provider.runner.as_ref());
        let commit = match resolver.resolve(reference, self.output_dir)? {
            Some(commit) => commit,
            None => {
                error!("Failed to check out ref {}", reference);
                return Err(FetchError::RefNotFound {
                    reference: reference.to_owned(),
                });
            }
        };

        let reset = self
            .provider
            .git
            .in_dir(self.output_dir)
            .args(["reset", "--hard", commit.as_str()]);
        Ok(self.provider.runner.run(&reset, self.capture)?)
    }

    fn update_submodules(&self) -> Step<'a> {
        let update = self
            .provider
            .git
            .in_dir(self.output_dir)
            .args(["submodule", "update", "--init", "--recursive"]);
        match self.provider.runner.run(&update, self.capture) {
            Ok(lines) => (Phase::UpdatingSubmodules(lines), None),
            Err(error) => (Phase::Done, Some(Err(error.into()))),
        }
    }
}

/// Forwards lines of a running command, moving to `then` once it exits successfully.
fn forward<'a>(mut lines: Lines, resume: fn(Lines) -> Phase<'a>, then: Phase<'a>) -> Step<'a> {
    match lines.next() {
        Some(Ok(line)) => (resume(lines), Some(Ok(line))),
        Some(Err(error)) => (Phase::Done, Some(Err(error.into()))),
        None => (then, None),
    }
}

impl Iterator for GitFetch<'_> {
    type Item = Result<String, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (phase, item) = match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Clone => self.start_clone(),
                Phase::Cloning(lines) => self.cloning(lines),
                Phase::Checkout(reference) => self.checkout(reference),
                Phase::Resetting(lines) => forward(lines, Phase::Resetting, Phase::Submodules),
                Phase::Submodules => self.update_submodules(),
                Phase::UpdatingSubmodules(lines) => {
                    forward(lines, Phase::UpdatingSubmodules, Phase::Done)
                }
                Phase::Done => return None,
            };
            self.phase = phase;
            if item.is_some() {
                return item;
            }
        }
    }
}
