//! Command execution
//!
//! This module runs tokenized command lines as pipelines of processes, with
//! each stage's stdout connected to the next stage's stdin. No shell is
//! involved.

use crate::error::{CommandError, CommandResult};
use crate::runner::EnvContext;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command as StdCommand, Stdio};

/// Where the first stage reads from
#[derive(Debug, Default)]
pub enum Source {
    #[default]
    Inherit,
    Null,
    File(File),
}

impl Source {
    fn into_stdio(self) -> Stdio {
        match self {
            Source::Inherit => Stdio::inherit(),
            Source::Null => Stdio::null(),
            Source::File(f) => Stdio::from(f),
        }
    }
}

/// Where output goes
#[derive(Debug, Default)]
pub enum Sink {
    #[default]
    Inherit,
    Null,
    File(File),
}

impl Sink {
    fn to_stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Sink::Inherit => Stdio::inherit(),
            Sink::Null => Stdio::null(),
            Sink::File(f) => Stdio::from(f.try_clone()?),
        })
    }
}

/// I/O descriptors for a pipeline
///
/// `stdin` feeds the first stage, `stdout` receives the last stage's output,
/// and `stderr` is shared by every stage.
#[derive(Debug, Default)]
pub struct CommandFds {
    pub stdin: Source,
    pub stdout: Sink,
    pub stderr: Sink,
}

/// How a pipeline is run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Wait for every stage to exit
    Foreground,
    /// Wait, and return the last stage's trimmed stdout
    Capture,
    /// Start the stages and return immediately
    Background,
}

/// Result of running a pipeline
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Captured(String),
    Started(BackgroundPipeline),
}

impl Outcome {
    /// Captured output, if the pipeline ran in capture mode
    pub fn output(&self) -> Option<&str> {
        match self {
            Outcome::Captured(s) => Some(s),
            _ => None,
        }
    }
}

/// A pipeline started in background mode
///
/// The caller owns the processes and decides when to reap them.
#[derive(Debug)]
pub struct BackgroundPipeline {
    children: Vec<(String, Child)>,
}

impl BackgroundPipeline {
    /// Process id of the last stage
    pub fn pid(&self) -> u32 {
        self.children.last().map(|(_, c)| c.id()).unwrap_or_default()
    }

    /// Wait for every stage, reporting the first failure
    pub fn wait(self) -> CommandResult<()> {
        wait_all(self.children)
    }
}

/// Tokenize `cmd` in `ctx` and run it
///
/// Sub-commands found while tokenizing run first, in capture mode, in the
/// same directory and scope.
pub fn run_command(
    ctx: &EnvContext<'_>,
    cmd: &str,
    dir: &Path,
    fds: CommandFds,
    mode: Mode,
) -> CommandResult<Outcome> {
    let stages = ctx.expand_command(cmd, &mut |sub| command_output(ctx, sub, dir))?;
    exec_pipeline(&stages, dir, &ctx.materialize(), fds, mode)
}

/// Run `cmd` in capture mode and return its trimmed stdout
pub fn command_output(ctx: &EnvContext<'_>, cmd: &str, dir: &Path) -> CommandResult<String> {
    match run_command(ctx, cmd, dir, CommandFds::default(), Mode::Capture)? {
        Outcome::Captured(output) => Ok(output),
        _ => Ok(String::new()),
    }
}

/// Run already tokenized pipeline stages
///
/// `dir` may be empty for the current directory. `env` holds `KEY=VALUE`
/// pairs and fully replaces the inherited environment. Capture mode ignores
/// the given descriptors: stdin and stderr are discarded and stdout is
/// collected in memory.
pub fn exec_pipeline(
    stages: &[Vec<String>],
    dir: &Path,
    env: &[String],
    fds: CommandFds,
    mode: Mode,
) -> CommandResult<Outcome> {
    if stages.is_empty() {
        return Err(CommandError::EmptyCommandLine);
    }
    let fds = if mode == Mode::Capture {
        CommandFds {
            stdin: Source::Null,
            stdout: Sink::Null,
            stderr: Sink::Null,
        }
    } else {
        fds
    };

    let mut children = spawn_stages(stages, dir, env, fds, mode == Mode::Capture)?;

    match mode {
        Mode::Background => Ok(Outcome::Started(BackgroundPipeline { children })),
        Mode::Foreground => {
            wait_all(children)?;
            Ok(Outcome::Completed)
        }
        Mode::Capture => {
            let mut buf = Vec::new();
            let read = match children.last_mut().and_then(|(_, c)| c.stdout.take()) {
                Some(mut out) => out.read_to_end(&mut buf).map(|_| ()),
                None => Ok(()),
            };
            wait_all(children)?;
            read.map_err(|source| CommandError::Io {
                context: "read command output failed".to_string(),
                source,
            })?;
            Ok(Outcome::Captured(String::from_utf8_lossy(&buf).trim().to_string()))
        }
    }
}

fn spawn_stages(
    stages: &[Vec<String>],
    dir: &Path,
    env: &[String],
    fds: CommandFds,
    capture: bool,
) -> CommandResult<Vec<(String, Child)>> {
    let env_pairs: Vec<(&str, &str)> = env.iter().filter_map(|kv| kv.split_once('=')).collect();
    let CommandFds {
        stdin,
        stdout,
        stderr,
    } = fds;
    let mut first_stdin = Some(stdin);
    let mut children: Vec<(String, Child)> = Vec::with_capacity(stages.len());
    let last = stages.len() - 1;

    for (i, stage) in stages.iter().enumerate() {
        let Some((program, args)) = stage.split_first() else {
            abort(children);
            return Err(CommandError::EmptyCommandLine);
        };

        let mut command = StdCommand::new(program);
        command.args(args).env_clear().envs(env_pairs.iter().copied());
        if !dir.as_os_str().is_empty() {
            command.current_dir(dir);
        }

        let input = match children.last_mut().and_then(|(_, c)| c.stdout.take()) {
            Some(previous) => Stdio::from(previous),
            None => first_stdin.take().map(Source::into_stdio).unwrap_or_else(Stdio::null),
        };
        command.stdin(input);

        let output = if i < last || capture {
            Ok(Stdio::piped())
        } else {
            stdout.to_stdio()
        };
        let descriptors = output.and_then(|out| Ok((out, stderr.to_stdio()?)));
        let (out, err) = match descriptors {
            Ok(d) => d,
            Err(source) => {
                abort(children);
                return Err(CommandError::Io {
                    context: "prepare command descriptors failed".to_string(),
                    source,
                });
            }
        };
        command.stdout(out).stderr(err);

        tracing::debug!(program = %program, args = ?args, dir = %dir.display(), stage = i, "starting pipeline stage");
        match command.spawn() {
            Ok(child) => children.push((program.clone(), child)),
            Err(source) => {
                abort(children);
                return Err(CommandError::Spawn {
                    program: program.clone(),
                    source,
                });
            }
        }
    }

    Ok(children)
}

/// Stop stages that already started when a later one cannot
fn abort(children: Vec<(String, Child)>) {
    for (_, mut child) in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Wait for every stage, keeping the first failure
fn wait_all(children: Vec<(String, Child)>) -> CommandResult<()> {
    let mut first_error = None;
    for (program, mut child) in children {
        let result = match child.wait() {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(CommandError::Exit {
                program,
                status: status.to_string(),
            }),
            Err(source) => Err(CommandError::Io {
                context: format!("wait for command '{}' failed", program),
                source,
            }),
        };
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
