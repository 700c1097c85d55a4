//! Content providers and the chain that picks one for a source.
//!
//! A provider claims a source in [`ContentProvider::detect`] without side effects and
//! materializes it in [`ContentProvider::fetch`]. Providers are registered as variants of
//! [`Provider`] and probed in order by [`ProviderChain`], with git as the catch-all last entry.

mod chain;
mod local;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    command::CommandError,
    git::{GitProvider, GitSpec},
    model::ParseError,
};

pub use chain::{ChainError, ProviderChain};
pub use local::{LocalProvider, LocalSpec};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to clone repository from {repo}: {error}")]
    FetchFailed {
        repo: String,
        #[source]
        error: CommandError,
    },
    #[error("Failed to check out ref {reference}: no branch, tag or commit has that name")]
    RefNotFound { reference: String },
    #[error("Output directory {} is not empty", .path.display())]
    OutputNotEmpty { path: PathBuf },
    #[error("Output path {} exists and is not a directory", .path.display())]
    OutputNotDirectory { path: PathBuf },
    #[error("Local source {} is not a directory", .path.display())]
    SourceNotDirectory { path: PathBuf },
    #[error("Output directory {} is inside the local source {}", .path.display(), .local.display())]
    OutputInsideSource { path: PathBuf, local: PathBuf },
    #[error("The {provider} provider cannot fetch a {spec} source")]
    SpecMismatch {
        provider: &'static str,
        spec: &'static str,
    },
    #[error("{0}")]
    Command(#[from] CommandError),
    #[error("Unexpected git output: {0}")]
    Parse(#[from] ParseError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Progress lines of a fetch in the order they were produced. Display only.
pub type Progress<'a> = Box<dyn Iterator<Item = Result<String, FetchError>> + 'a>;

pub trait ContentProvider {
    type Spec;

    /// Claims `source` by returning the spec `fetch` needs. Must not touch the filesystem or
    /// the network.
    fn detect(&self, source: &str, reference: Option<&str>) -> Option<Self::Spec>;

    /// Materializes `spec` into `output_dir`, which must be absent or empty.
    ///
    /// Work happens as the returned sequence is consumed. With `yield_output` unset, tool output
    /// goes straight to the terminal and the sequence only carries errors.
    fn fetch<'a>(
        &'a self,
        spec: &'a Self::Spec,
        output_dir: &'a Path,
        yield_output: bool,
    ) -> Result<Progress<'a>, FetchError>;

    /// Identifies the fetched content, if the provider has a notion of content identity.
    fn content_id(
        &self,
        _spec: &Self::Spec,
        _output_dir: &Path,
    ) -> Result<Option<String>, FetchError> {
        Ok(None)
    }
}

/// Spec produced by one of the [`Provider`] variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Local(LocalSpec),
    Git(GitSpec),
}

impl SourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Local(_) => LocalProvider::NAME,
            SourceSpec::Git(_) => GitProvider::NAME,
        }
    }
}

#[derive(Debug)]
pub enum Provider {
    Local(LocalProvider),
    /// Matches every source; belongs at the end of a chain.
    Git(GitProvider),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Local(_) => LocalProvider::NAME,
            Provider::Git(_) => GitProvider::NAME,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Provider::Git(_))
    }

    pub fn detect(&self, source: &str, reference: Option<&str>) -> Option<SourceSpec> {
        match self {
            Provider::Local(provider) => provider.detect(source, reference).map(SourceSpec::Local),
            Provider::Git(provider) => provider.detect(source, reference).map(SourceSpec::Git),
        }
    }

    pub fn fetch<'a>(
        &'a self,
        spec: &'a SourceSpec,
        output_dir: &'a Path,
        yield_output: bool,
    ) -> Result<Progress<'a>, FetchError> {
        match (self, spec) {
            (Provider::Local(provider), SourceSpec::Local(spec)) => {
                provider.fetch(spec, output_dir, yield_output)
            }
            (Provider::Git(provider), SourceSpec::Git(spec)) => {
                provider.fetch(spec, output_dir, yield_output)
            }
            (provider, spec) => Err(FetchError::SpecMismatch {
                provider: provider.name(),
                spec: spec.kind(),
            }),
        }
    }

    pub fn content_id(
        &self,
        spec: &SourceSpec,
        output_dir: &Path,
    ) -> Result<Option<String>, FetchError> {
        match (self, spec) {
            (Provider::Local(provider), SourceSpec::Local(spec)) => {
                provider.content_id(spec, output_dir)
            }
            (Provider::Git(provider), SourceSpec::Git(spec)) => {
                provider.content_id(spec, output_dir)
            }
            (provider, spec) => Err(FetchError::SpecMismatch {
                provider: provider.name(),
                spec: spec.kind(),
            }),
        }
    }
}

/// Fails unless `output_dir` is missing or an empty directory.
pub(crate) fn ensure_vacant(output_dir: &Path) -> Result<(), FetchError> {
    if !output_dir.exists() {
        return Ok(());
    }
    if !output_dir.is_dir() {
        return Err(FetchError::OutputNotDirectory {
            path: output_dir.to_path_buf(),
        });
    }
    if std::fs::read_dir(output_dir)?.next().is_some() {
        return Err(FetchError::OutputNotEmpty {
            path: output_dir.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::git::GitCli;

    #[test]
    fn vacant_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_vacant(&dir.path().join("missing")).is_ok());
        assert!(ensure_vacant(dir.path()).is_ok());

        std::fs::write(dir.path().join("file"), "content").unwrap();
        assert!(matches!(
            ensure_vacant(dir.path()),
            Err(FetchError::OutputNotEmpty { .. })
        ));
        assert!(matches!(
            ensure_vacant(&dir.path().join("file")),
            Err(FetchError::OutputNotDirectory { .. })
        ));
    }

    #[test]
    fn spec_from_another_provider_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let local = Provider::Local(LocalProvider);
        let git_spec = Provider::Git(GitProvider::new(GitCli::default()))
            .detect("https://example.com/repo.git", None)
            .unwrap();

        let result = local.fetch(&git_spec, dir.path(), true);
        match result {
            Err(FetchError::SpecMismatch { provider, spec }) => {
                assert_eq!(provider, "local");
                assert_eq!(spec, "git");
            }
            _ => panic!("expected a spec mismatch"),
        }
    }
}
