#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    sync::Once,
};

use tempfile::TempDir;

const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// Submodules in the fixtures live behind `file://` URLs, which git refuses by default.
const ALLOW_FILE_PROTOCOL: [(&str, &str); 3] = [
    ("GIT_CONFIG_COUNT", "1"),
    ("GIT_CONFIG_KEY_0", "protocol.file.allow"),
    ("GIT_CONFIG_VALUE_0", "always"),
];

pub fn git_command() -> Command {
    let mut cmd = Command::new("git");
    for key in GIT_ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.envs(ALLOW_FILE_PROTOCOL);
    cmd
}

/// Lets git processes spawned by the library under test clone `file://` submodules.
pub fn allow_file_protocol() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        for (key, value) in ALLOW_FILE_PROTOCOL {
            std::env::set_var(key, value);
        }
    });
}

fn init_repo(path: &Path) {
    fs::create_dir_all(path).expect("create_dir_all should succeed");
    git(path, &["init"]);
    git(path, &["checkout", "-b", "main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test"]);
    git(path, &["config", "commit.gpgsign", "false"]);
    git(path, &["config", "tag.gpgsign", "false"]);
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = git_command()
        .current_dir(dir)
        .args(args)
        .output()
        .expect("git should run");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

/// An upstream repository with history on `main`, a `feature` branch and an annotated tag `v1`
/// on the second commit of `main`.
pub struct Upstream {
    dir: TempDir,
    pub path: PathBuf,
    /// Commits on `main`, oldest first.
    pub main: Vec<String>,
    pub feature: String,
}

/// A branch `with-library` of an [`Upstream`] that adds a submodule at `library`, pinned to the
/// older of two commits of the submodule repository.
pub struct WithSubmodule {
    pub upstream: Upstream,
    pub branch: &'static str,
    pub pinned: String,
    pub library_tip: String,
}

impl Upstream {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir should succeed");
        let path = dir.path().join("upstream");
        init_repo(&path);

        let mut main = Vec::new();
        for version in 1..=3 {
            fs::write(path.join("VERSION"), version.to_string()).expect("write should succeed");
            git(&path, &["add", "."]);
            git(&path, &["commit", "-m", &format!("Version {version}")]);
            main.push(git(&path, &["rev-parse", "HEAD"]));
        }
        git(&path, &["tag", "-a", "v1", "-m", "Release v1", &main[1]]);

        git(&path, &["checkout", "-b", "feature"]);
        fs::write(path.join("FEATURE"), "on").expect("write should succeed");
        git(&path, &["add", "."]);
        git(&path, &["commit", "-m", "Feature"]);
        let feature = git(&path, &["rev-parse", "HEAD"]);
        git(&path, &["checkout", "main"]);

        Upstream {
            dir,
            path,
            main,
            feature,
        }
    }

    /// `file://` so that depth limits are honored.
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    pub fn tip(&self) -> &str {
        self.main.last().expect("main has commits")
    }

    pub fn first(&self) -> &str {
        &self.main[0]
    }

    pub fn with_submodule(self) -> WithSubmodule {
        let library = self.dir.path().join("library");
        init_repo(&library);
        let mut commits = Vec::new();
        for version in ["old", "new"] {
            fs::write(library.join("LIBRARY"), version).expect("write should succeed");
            git(&library, &["add", "."]);
            git(&library, &["commit", "-m", version]);
            commits.push(git(&library, &["rev-parse", "HEAD"]));
        }

        let branch = "with-library";
        let library_url = format!("file://{}", library.display());
        git(&self.path, &["checkout", "-b", branch]);
        git(&self.path, &["submodule", "add", &library_url, "library"]);
        git(&self.path.join("library"), &["checkout", &commits[0]]);
        git(&self.path, &["add", "."]);
        git(&self.path, &["commit", "-m", "Add library"]);
        git(&self.path, &["checkout", "main"]);

        WithSubmodule {
            upstream: self,
            branch,
            pinned: commits[0].clone(),
            library_tip: commits[1].clone(),
        }
    }
}

pub fn head(checkout: &Path) -> String {
    git(checkout, &["rev-parse", "HEAD"])
}

pub fn is_shallow(checkout: &Path) -> bool {
    git(checkout, &["rev-parse", "--is-shallow-repository"]) == "true"
}
