use log::{debug, info, warn};
use thiserror::Error;

use crate::git::GitProvider;

use super::{LocalProvider, Provider, SourceSpec};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("No content provider recognizes {input}")]
    NoProviderMatched { input: String },
}

/// Providers probed in registration order. The first whose `detect` matches handles the source.
#[derive(Debug)]
pub struct ProviderChain {
    providers: Vec<Provider>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Provider>) -> Self {
        if let Some(position) = providers.iter().position(Provider::is_fallback) {
            if position + 1 != providers.len() {
                warn!(
                    "The {} provider matches every source, providers registered after it are unreachable",
                    providers[position].name()
                );
            }
        }
        ProviderChain { providers }
    }

    /// Local sources first, git for everything else.
    pub fn with_git(git: GitProvider) -> Self {
        ProviderChain::new(vec![
            Provider::Local(LocalProvider),
            Provider::Git(git),
        ])
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn resolve(
        &self,
        source: &str,
        reference: Option<&str>,
    ) -> Result<(&Provider, SourceSpec), ChainError> {
        for provider in &self.providers {
            debug!("Trying the {} provider for {}", provider.name(), source);
            if let Some(spec) = provider.detect(source, reference) {
                info!("Using the {} provider for {}", provider.name(), source);
                return Ok((provider, spec));
            }
        }
        Err(ChainError::NoProviderMatched {
            input: source.to_owned(),
        })
    }
}

impl Default for ProviderChain {
    fn default() -> Self {
        ProviderChain::with_git(GitProvider::default())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{git::GitSpec, provider::LocalSpec};

    use pretty_assertions::assert_eq;

    #[test]
    fn git_is_the_last_provider() {
        let chain = ProviderChain::default();
        let names: Vec<_> = chain.providers().iter().map(Provider::name).collect();
        assert_eq!(names, vec!["local", "git"]);
        assert!(chain.providers().last().unwrap().is_fallback());
        assert_eq!(
            chain
                .providers()
                .iter()
                .filter(|provider| provider.is_fallback())
                .count(),
            1
        );
    }

    #[test]
    fn local_prefix_is_claimed_by_local_provider() {
        let chain = ProviderChain::default();
        let (provider, spec) = chain.resolve("local:/srv/project", None).unwrap();
        assert_eq!(provider.name(), "local");
        assert_eq!(
            spec,
            SourceSpec::Local(LocalSpec {
                path: PathBuf::from("/srv/project")
            })
        );
    }

    #[test]
    fn anything_else_falls_back_to_git() {
        let chain = ProviderChain::default();
        let (provider, spec) = chain
            .resolve("/no/such/directory/anywhere", Some("v2"))
            .unwrap();
        assert_eq!(provider.name(), "git");
        assert_eq!(
            spec,
            SourceSpec::Git(GitSpec {
                repo: "/no/such/directory/anywhere".to_owned(),
                reference: Some("v2".to_owned()),
            })
        );
    }

    #[test]
    fn chain_without_fallback_can_fail() {
        let chain = ProviderChain::new(vec![Provider::Local(LocalProvider)]);
        match chain.resolve("https://example.com/repo.git", None) {
            Err(error @ ChainError::NoProviderMatched { .. }) => {
                assert_eq!(
                    error.to_string(),
                    "No content provider recognizes https://example.com/repo.git"
                );
                let ChainError::NoProviderMatched { input } = error;
                assert_eq!(input, "https://example.com/repo.git")
            }
            Ok((provider, _)) => panic!("unexpected match by {}", provider.name()),
        }
    }

    #[test]
    fn first_match_wins() {
        let chain = ProviderChain::new(vec![
            Provider::Git(GitProvider::default()),
            Provider::Local(LocalProvider),
        ]);
        let (provider, _) = chain.resolve("local:/srv/project", None).unwrap();
        assert_eq!(provider.name(), "git");
    }
}
