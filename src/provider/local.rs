use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use super::{ensure_vacant, ContentProvider, FetchError, Progress};

const PREFIX: &str = "local:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSpec {
    pub path: PathBuf,
}

impl LocalSpec {
    /// The source directory with a leading `~/` replaced by the home directory.
    fn expanded_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~"), home::home_dir()) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => self.path.clone(),
        }
    }
}

/// Copies a directory on this machine, addressed as `local:<path>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProvider;

impl LocalProvider {
    pub const NAME: &'static str = "local";
}

impl ContentProvider for LocalProvider {
    type Spec = LocalSpec;

    fn detect(&self, source: &str, reference: Option<&str>) -> Option<LocalSpec> {
        let path = source.strip_prefix(PREFIX)?;
        if path.is_empty() {
            return None;
        }
        if let Some(reference) = reference {
            debug!("Ignoring ref {} for local source {}", reference, path);
        }
        Some(LocalSpec {
            path: PathBuf::from(path),
        })
    }

    fn fetch<'a>(
        &'a self,
        spec: &'a LocalSpec,
        output_dir: &'a Path,
        yield_output: bool,
    ) -> Result<Progress<'a>, FetchError> {
        ensure_vacant(output_dir)?;
        let source = spec.expanded_path();
        if !fs::metadata(&source)?.is_dir() {
            return Err(FetchError::SourceNotDirectory { path: source });
        }
        let local = source.canonicalize()?;
        let target = canonicalize_missing(output_dir)?;
        if target.starts_with(&local) {
            return Err(FetchError::OutputInsideSource {
                path: target,
                local,
            });
        }

        info!(
            "Copying {} into {}",
            source.display(),
            output_dir.display()
        );
        let copy = std::iter::once_with(move || -> Result<String, FetchError> {
            let copied = copy_tree(&source, output_dir)?;
            Ok(format!(
                "Copied {} files from local directory {}",
                copied,
                source.display()
            ))
        });
        Ok(Box::new(copy.filter(move |result| {
            yield_output || result.is_err()
        })))
    }
}

/// Recursively copies `from` into `to`, returning the number of files and links copied.
fn copy_tree(from: &Path, to: &Path) -> Result<usize, FetchError> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(&entry.path(), &target)?;
            copied += 1;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Canonicalizes the longest existing prefix of `path` and appends the rest unchanged.
fn canonicalize_missing(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(resolved, |resolved, name| resolved.join(name)))
            }
            Err(error) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = if parent.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        parent
                    };
                }
                _ => return Err(error),
            },
        }
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to).map(|_| ())
}
