use std::{fmt::Display, path::Path};

use log::{debug, info, warn};

use crate::{
    command::{CommandError, CommandRunner, Invocation},
    model::ResolvedCommit,
};

use super::GitCli;

/// Ways of reading a user supplied reference, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpretation {
    /// A branch or tag on `origin`.
    RemoteRef,
    /// A full or abbreviated commit hash, possibly beyond the shallow history.
    CommitHash,
}

const INTERPRETATIONS: [Interpretation; 2] =
    [Interpretation::RemoteRef, Interpretation::CommitHash];

impl Display for Interpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interpretation::RemoteRef => f.write_str("remote branch or tag"),
            Interpretation::CommitHash => f.write_str("commit hash"),
        }
    }
}

/// Pins a reference to a commit inside an existing checkout.
pub struct ReferenceResolver<'a> {
    git: &'a GitCli,
    runner: &'a dyn CommandRunner,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(git: &'a GitCli, runner: &'a dyn CommandRunner) -> Self {
        ReferenceResolver { git, runner }
    }

    /// Returns `None` when no interpretation of `reference` names a commit.
    ///
    /// A git command exiting unsuccessfully only rules out the interpretation that ran it; an
    /// error is returned only when git cannot be run at all.
    pub fn resolve(
        &self,
        reference: &str,
        working_dir: &Path,
    ) -> Result<Option<ResolvedCommit>, CommandError> {
        if reference.is_empty() || reference.starts_with('-') {
            warn!("Refusing to resolve malformed reference `{}`", reference);
            return Ok(None);
        }

        for interpretation in INTERPRETATIONS {
            let resolved = match interpretation {
                Interpretation::RemoteRef => self.remote_ref(reference, working_dir)?,
                Interpretation::CommitHash => self.commit_hash(reference, working_dir)?,
            };
            match resolved {
                Some(commit) => {
                    info!(
                        "Resolved {} as {} {}",
                        reference,
                        interpretation,
                        commit.short()
                    );
                    return Ok(Some(commit));
                }
                None => debug!("{} is not a {}", reference, interpretation),
            }
        }

        Ok(None)
    }

    fn remote_ref(
        &self,
        reference: &str,
        working_dir: &Path,
    ) -> Result<Option<ResolvedCommit>, CommandError> {
        let fetch = self
            .git
            .in_dir(working_dir)
            .args(["fetch", "--depth", "1", "origin", reference]);
        if !self.succeeds(&fetch)? {
            return Ok(None);
        }
        self.rev_parse("FETCH_HEAD", working_dir)
    }

    fn commit_hash(
        &self,
        reference: &str,
        working_dir: &Path,
    ) -> Result<Option<ResolvedCommit>, CommandError> {
        if let Some(commit) = self.rev_parse(reference, working_dir)? {
            return Ok(Some(commit));
        }
        if !self.is_shallow(working_dir)? {
            return Ok(None);
        }

        info!(
            "{} is not in the shallow history, fetching the full history",
            reference
        );
        let unshallow = self.git.in_dir(working_dir).args(["fetch", "--unshallow"]);
        if !self.succeeds(&unshallow)? {
            return Ok(None);
        }
        self.rev_parse(reference, working_dir)
    }

    fn rev_parse(
        &self,
        revision: &str,
        working_dir: &Path,
    ) -> Result<Option<ResolvedCommit>, CommandError> {
        let peeled = format!("{revision}^{{commit}}");
        let rev_parse = self
            .git
            .in_dir(working_dir)
            .args(["rev-parse", "--verify", "--quiet", peeled.as_str()]);
        match self.runner.output(&rev_parse) {
            Ok(output) => match output.parse() {
                Ok(commit) => Ok(Some(commit)),
                Err(error) => {
                    warn!("Unexpected rev-parse output for {}: {}", revision, error);
                    Ok(None)
                }
            },
            Err(CommandError::Failed { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn is_shallow(&self, working_dir: &Path) -> Result<bool, CommandError> {
        let query = self
            .git
            .in_dir(working_dir)
            .args(["rev-parse", "--is-shallow-repository"]);
        match self.runner.output(&query) {
            Ok(output) => Ok(output == "true"),
            Err(CommandError::Failed { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn succeeds(&self, invocation: &Invocation) -> Result<bool, CommandError> {
        match self.runner.output(invocation) {
            Ok(_) => Ok(true),
            Err(error @ CommandError::Failed { .. }) => {
                debug!("{}", error);
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }
}
