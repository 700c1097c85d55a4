use std::{error::Error, path::Path};

use log::info;

use crate::provider::{ProviderChain, SourceSpec};

mod builder;

pub use builder::RepofetchBuilder;

pub struct Repofetch {
    chain: ProviderChain,
    capture: bool,
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Name of the provider that handled the source.
    pub provider: &'static str,
    pub content_id: Option<String>,
}

impl Repofetch {
    pub fn builder() -> RepofetchBuilder {
        RepofetchBuilder::default()
    }

    /// Names the provider that would handle `source` and what it understood the source to be.
    pub fn detect(
        &self,
        source: &str,
        reference: Option<&str>,
    ) -> Result<(&'static str, SourceSpec), Box<dyn Error>> {
        let (provider, spec) = self.chain.resolve(source, reference)?;
        Ok((provider.name(), spec))
    }

    /// Materializes `source` into `output_dir`, passing every progress line to `on_line`.
    pub fn fetch(
        &self,
        source: &str,
        reference: Option<&str>,
        output_dir: &Path,
        mut on_line: impl FnMut(&str),
    ) -> Result<Fetched, Box<dyn Error>> {
        let (provider, spec) = self.chain.resolve(source, reference)?;
        for line in provider.fetch(&spec, output_dir, self.capture)? {
            on_line(&line?);
        }

        let content_id = provider.content_id(&spec, output_dir)?;
        info!(
            "Fetched {} into {}{}",
            source,
            output_dir.display(),
            content_id
                .as_deref()
                .map(|id| format!(" at {id}"))
                .unwrap_or_default()
        );
        Ok(Fetched {
            provider: provider.name(),
            content_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn detect_reports_provider() {
        let repofetch = Repofetch::builder().try_build().unwrap();
        let (provider, _) = repofetch.detect("local:/srv/project", None).unwrap();
        assert_eq!(provider, "local");
        let (provider, _) = repofetch
            .detect("https://example.com/repo.git", Some("main"))
            .unwrap();
        assert_eq!(provider, "git");
    }

    #[test]
    fn empty_git_program_is_rejected() {
        assert!(Repofetch::builder().git_program("").try_build().is_err());
    }

    #[test]
    fn fetch_local_directory() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("app.py"), "print()").unwrap();
        let output = tempfile::tempdir().unwrap();
        let output_dir = output.path().join("out");

        let repofetch = Repofetch::builder().try_build().unwrap();
        let mut lines = Vec::new();
        let fetched = repofetch
            .fetch(
                &format!("local:{}", source.path().display()),
                None,
                &output_dir,
                |line| lines.push(line.to_owned()),
            )
            .unwrap();

        assert_eq!(
            fetched,
            Fetched {
                provider: "local",
                content_id: None
            }
        );
        assert_eq!(lines.len(), 1);
        assert!(output_dir.join("app.py").exists());
    }

    #[test]
    fn fetch_into_occupied_directory_fails() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(output.path().join("taken"), "").unwrap();

        let repofetch = Repofetch::builder().try_build().unwrap();
        let error = repofetch
            .fetch(
                &format!("local:{}", source.path().display()),
                None,
                output.path(),
                |_| {},
            )
            .unwrap_err();
        assert!(error.to_string().contains("is not empty"));
    }
}
