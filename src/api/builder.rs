use std::{error::Error, ffi::OsString};

use crate::{
    git::{GitCli, GitProvider},
    provider::ProviderChain,
    Repofetch,
};

#[derive(Default)]
pub struct RepofetchBuilder {
    git_program: Option<OsString>,
    capture_output: Option<bool>,
    chain: Option<ProviderChain>,
}

impl RepofetchBuilder {
    /// Git client used by the git provider.
    ///
    /// Defaults to `git` looked up on `PATH`.
    pub fn git_program(mut self, program: impl Into<OsString>) -> Self {
        self.git_program = Some(program.into());
        self
    }

    /// Whether tool output is collected and handed to the caller line by line, or left to go
    /// straight to the terminal.
    ///
    /// Defaults to `true`.
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = Some(capture);
        self
    }

    /// Replaces the default chain of providers. Takes precedence over `git_program`.
    pub fn chain(mut self, chain: ProviderChain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn try_build(self) -> Result<Repofetch, Box<dyn Error>> {
        let Self {
            git_program,
            capture_output,
            chain,
        } = self;

        let chain = match (chain, git_program) {
            (Some(chain), _) => chain,
            (None, Some(program)) => {
                if program.is_empty() {
                    return Err("Git program must not be empty".into());
                }
                ProviderChain::with_git(GitProvider::new(GitCli::new(program)))
            }
            (None, None) => ProviderChain::default(),
        };

        Ok(Repofetch {
            chain,
            capture: capture_output.unwrap_or(true),
        })
    }
}
