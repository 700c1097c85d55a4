use std::{
    ffi::{OsStr, OsString},
    fmt::Display,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::mpsc::{self, Receiver, Sender},
    thread::JoinHandle,
};

use log::{debug, trace, warn};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command `{}` failed with {}", .args.join(" "), render_exit_code(.code))]
    Failed { args: Vec<String>, code: Option<i32> },
    #[error("Failed to spawn `{command}`: {error}")]
    Spawn {
        command: String,
        error: std::io::Error,
    },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

impl CommandError {
    /// Exit code of a process that ran to completion unsuccessfully.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

fn render_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_owned(),
    }
}

/// A single external process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    env_remove: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_remove: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory of the child. Defaults to the caller's current directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Program followed by its arguments, lossily converted for reporting.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.get_args())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for key in &self.env_remove {
            command.env_remove(key);
        }
        command
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Lazily produced output lines of a running process.
///
/// Yields `Err` at most once, after which the sequence is exhausted.
pub type Lines = Box<dyn Iterator<Item = Result<String, CommandError>>>;

pub trait CommandRunner {
    /// Spawns `invocation`. With `capture` the interleaved stdout and stderr lines are yielded as
    /// they arrive; without it the child writes straight to the terminal and nothing is yielded.
    /// A non-zero exit surfaces as the last item of the sequence.
    fn run(&self, invocation: &Invocation, capture: bool) -> Result<Lines, CommandError>;

    /// Runs `invocation` to completion and returns its trimmed stdout.
    fn output(&self, invocation: &Invocation) -> Result<String, CommandError>;
}

/// Runs invocations as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation, capture: bool) -> Result<Lines, CommandError> {
        let mut command = invocation.to_command();
        if capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        debug!("Running {}", invocation);
        let mut child = command.spawn().map_err(|error| CommandError::Spawn {
            command: invocation.to_string(),
            error,
        })?;

        let mut lines = ProcessLines {
            args: invocation.argv(),
            child: None,
            receiver: None,
            readers: Vec::new(),
        };

        if capture {
            let (sender, receiver) = mpsc::channel();
            if let Some(stdout) = child.stdout.take() {
                lines.readers.push(spawn_reader(stdout, sender.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                lines.readers.push(spawn_reader(stderr, sender));
            }
            lines.receiver = Some(receiver);
        }
        lines.child = Some(child);

        Ok(Box::new(lines))
    }

    fn output(&self, invocation: &Invocation) -> Result<String, CommandError> {
        trace!("Reading output of {}", invocation);
        let output = invocation
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|error| CommandError::Spawn {
                command: invocation.to_string(),
                error,
            })?;

        if !output.status.success() {
            trace!(
                "{} failed: {}",
                invocation,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(CommandError::Failed {
                args: invocation.argv(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

fn spawn_reader<R>(pipe: R, sender: Sender<std::io::Result<String>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            let line = match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => return,
                Ok(_) => Ok(String::from_utf8_lossy(&buffer)
                    .trim_end_matches(['\n', '\r'])
                    .to_owned()),
                Err(error) => Err(error),
            };
            let failed = line.is_err();
            if sender.send(line).is_err() || failed {
                return;
            }
        }
    })
}

struct ProcessLines {
    args: Vec<String>,
    child: Option<Child>,
    receiver: Option<Receiver<std::io::Result<String>>>,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessLines {
    fn finish(&mut self) -> Option<Result<String, CommandError>> {
        // Drain whatever is left so the pipes never fill up while we wait.
        if let Some(receiver) = self.receiver.take() {
            for line in receiver.iter().flatten() {
                trace!("Discarding output: {}", line);
            }
        }
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                warn!("Output reader of `{}` panicked", self.args.join(" "));
            }
        }

        let mut child = self.child.take()?;
        match child.wait() {
            Ok(status) if status.success() => {
                debug!("`{}` finished successfully", self.args.join(" "));
                None
            }
            Ok(status) => Some(Err(CommandError::Failed {
                args: self.args.clone(),
                code: status.code(),
            })),
            Err(error) => Some(Err(error.into())),
        }
    }
}

impl Iterator for ProcessLines {
    type Item = Result<String, CommandError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(receiver) = &self.receiver {
            match receiver.recv() {
                Ok(Ok(line)) => return Some(Ok(line)),
                Ok(Err(error)) => {
                    let result = self.finish();
                    return Some(match result {
                        Some(Err(failed)) => Err(failed),
                        _ => Err(error.into()),
                    });
                }
                // Both pipes closed.
                Err(_) => self.receiver = None,
            }
        }
        self.finish()
    }
}

impl Drop for ProcessLines {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!(
                "Output of `{}` abandoned, waiting for the process to exit",
                self.args.join(" ")
            );
            let _ = self.finish();
        }
    }
}
