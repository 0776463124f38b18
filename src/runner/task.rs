//! Task execution
//!
//! [`Runner`] walks a task's action list and hands each action to the
//! runtime: commands to the pipeline executor, `if` to the condition
//! evaluator, file actions to [`crate::fileops`]. Templates run in a child
//! scope that is dropped when they return.

use crate::config::{
    Action, ActionKind, CmdAction, Configuration, CopyAction, DownloadAction, HashAction,
    ListAction, ReplaceAction,
};
use crate::error::{ExecutionError, ExecutionResult, FileOpError};
use crate::fileops::{
    check_file_hash, copy_path, download_file, file_replacer, glob_expand_in, open_output,
};
use crate::runner::{run_command, BackgroundPipeline, CommandFds, EnvContext, Mode, Outcome, Sink, Source};
use crate::ui::{Printer, Verbosity};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Runs tasks from one configuration
#[derive(Debug)]
pub struct Runner<'c> {
    config: &'c Configuration,
    base_dir: PathBuf,
    printer: Printer,
    background: Vec<BackgroundPipeline>,
}

impl<'c> Runner<'c> {
    /// `base_dir` is the configuration file's directory; task `workdir`s are
    /// relative to it.
    pub fn new(config: &'c Configuration, base_dir: impl Into<PathBuf>, printer: Printer) -> Self {
        Runner {
            config,
            base_dir: base_dir.into(),
            printer,
            background: Vec::new(),
        }
    }

    /// Root scope: the process environment plus the configuration's `envs`
    pub fn root_context(&self) -> EnvContext<'static> {
        let mut root = EnvContext::from_process();
        for env in &self.config.envs {
            root.apply_env(&env.name, &env.value);
        }
        root
    }

    /// Run the task `name` with argument values given on the command line
    ///
    /// Arguments without a value keep an inherited variable of the same
    /// name, or get their expanded default. Background pipelines started by
    /// the task are waited for before this returns.
    pub fn run_task(
        &mut self,
        root: &EnvContext<'_>,
        name: &str,
        args: &HashMap<String, String>,
    ) -> ExecutionResult<()> {
        let task = self
            .config
            .tasks
            .get(name)
            .ok_or_else(|| ExecutionError::TaskNotFound(name.to_string()))?;
        self.printer.task(name);

        let mut scope = root.child();
        for arg in &task.args {
            if let Some(value) = args.get(&arg.env) {
                scope.set(arg.env.clone(), value.clone());
            } else if !scope.exists(&arg.env) {
                let value = scope.expand(&arg.default);
                scope.set(arg.env.clone(), value);
            }
        }

        let dir = if task.workdir.is_empty() {
            PathBuf::new()
        } else {
            resolve(&self.base_dir, &scope.expand(&task.workdir))
        };

        let result = self.run_actions(&mut scope, &dir, &task.actions);
        let reaped = self.reap();
        result.and(reaped)
    }

    /// Run an action list; `chdir` only affects the rest of this list
    pub fn run_actions(
        &mut self,
        scope: &mut EnvContext<'_>,
        dir: &Path,
        actions: &[Action],
    ) -> ExecutionResult<()> {
        let mut dir = dir.to_path_buf();
        for action in actions {
            self.run_action(scope, &mut dir, action)?;
        }
        Ok(())
    }

    fn run_action(
        &mut self,
        scope: &mut EnvContext<'_>,
        dir: &mut PathBuf,
        action: &Action,
    ) -> ExecutionResult<()> {
        let kind = action.kind().ok_or_else(|| {
            let names: Vec<_> = action.kinds().iter().map(|k| k.name()).collect();
            ExecutionError::InvalidAction(format!("expected one action kind, found [{}]", names.join(", ")))
        })?;

        match kind {
            ActionKind::Env(env) => scope.apply_env(&env.name, &env.value),
            ActionKind::Cmd(cmd) => self.run_cmd(scope, dir, cmd)?,
            ActionKind::If(condition) => {
                let passed = condition.evaluate(scope)?;
                tracing::debug!(value = %condition.value, operator = %condition.operator, passed, "evaluated condition");
                let branch = if passed { &action.then } else { &action.otherwise };
                self.run_actions(scope, dir, branch)?;
            }
            ActionKind::Copy(copy) => self.run_copy(scope, dir, copy)?,
            ActionKind::Hash(hash) => self.run_hash(scope, dir, hash)?,
            ActionKind::Download(download) => self.run_download(scope, dir, download)?,
            ActionKind::Replace(replace) => self.run_replace(scope, dir, replace)?,
            ActionKind::List(list) => self.run_list(scope, dir, list)?,
            ActionKind::Template(name) => {
                let actions = self
                    .config
                    .templates
                    .get(name)
                    .ok_or_else(|| ExecutionError::TemplateNotFound(name.to_string()))?;
                self.printer.debug(&format!("template {}", name));
                let mut child = scope.child();
                self.run_actions(&mut child, dir, actions)?;
            }
            ActionKind::Chdir(target) => {
                *dir = resolve(dir, &scope.expand(target));
                self.printer.debug(&format!("chdir {}", dir.display()));
            }
        }
        Ok(())
    }

    fn run_cmd(&mut self, scope: &mut EnvContext<'_>, dir: &Path, cmd: &CmdAction) -> ExecutionResult<()> {
        let cmd_dir = if cmd.dir.is_empty() {
            dir.to_path_buf()
        } else {
            resolve(dir, &scope.expand(&cmd.dir))
        };
        self.printer.command(&cmd.exec);

        let stdin = if cmd.stdin.is_empty() {
            Source::Inherit
        } else {
            let path = resolve(dir, &scope.expand(&cmd.stdin));
            let file = File::open(&path).map_err(|e| FileOpError::io("open stdin file failed", &path, e))?;
            Source::File(file)
        };
        let fds = CommandFds {
            stdin,
            stdout: self.sink(scope, dir, &cmd.stdout, cmd.append)?,
            stderr: self.sink(scope, dir, &cmd.stderr, cmd.append)?,
        };
        let mode = if cmd.capture {
            Mode::Capture
        } else if cmd.background {
            Mode::Background
        } else {
            Mode::Foreground
        };

        match run_command(scope, &cmd.exec, &cmd_dir, fds, mode)? {
            Outcome::Captured(output) if cmd.env.is_empty() => self.printer.output(&output),
            Outcome::Captured(output) => scope.set(cmd.env.clone(), output),
            Outcome::Started(pipeline) => {
                tracing::debug!(pid = pipeline.pid(), exec = %cmd.exec, "started background pipeline");
                self.background.push(pipeline);
            }
            Outcome::Completed => {}
        }
        Ok(())
    }

    fn sink(&self, scope: &EnvContext<'_>, dir: &Path, target: &str, append: bool) -> ExecutionResult<Sink> {
        if target.is_empty() {
            return Ok(if self.printer.verbosity == Verbosity::Silent {
                Sink::Null
            } else {
                Sink::Inherit
            });
        }
        let path = resolve(dir, &scope.expand(target));
        Ok(Sink::File(open_output(&path, append)?))
    }

    fn run_copy(&self, scope: &EnvContext<'_>, dir: &Path, copy: &CopyAction) -> ExecutionResult<()> {
        let sources = expand_glob(scope, dir, &copy.src, false)?;
        let dst = resolve(dir, &scope.expand(&copy.dst));
        if let [src] = sources.as_slice() {
            copy_path(&dst, src)?;
            return Ok(());
        }
        for src in &sources {
            let name = src
                .file_name()
                .ok_or_else(|| ExecutionError::InvalidAction(format!("copy source has no file name: {}", src.display())))?;
            copy_path(&dst.join(name), src)?;
        }
        Ok(())
    }

    fn run_hash(&self, scope: &EnvContext<'_>, dir: &Path, hash: &HashAction) -> ExecutionResult<()> {
        let alg = scope.expand(&hash.alg);
        let sig = scope.expand(&hash.sig);
        for path in expand_glob(scope, dir, &hash.path, true)? {
            if !check_file_hash(&path, &alg, &sig)? {
                return Err(ExecutionError::HashMismatch(path.display().to_string()));
            }
        }
        Ok(())
    }

    fn run_download(&self, scope: &EnvContext<'_>, dir: &Path, download: &DownloadAction) -> ExecutionResult<()> {
        let url = scope.expand(&download.url);
        let dst = resolve(dir, &scope.expand(&download.dst));
        let alg = scope.expand(&download.alg);
        let sig = scope.expand(&download.sig);
        let verify = !alg.is_empty();

        if dst.is_file() && (!verify || check_file_hash(&dst, &alg, &sig)?) {
            self.printer.info(&format!("{} is up to date", dst.display()));
            return Ok(());
        }

        self.printer.info(&format!("downloading {}", url));
        let tmp = download_file(&url)?;
        let result = install_download(&tmp, &dst, &alg, &sig, &url);
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "failed to remove downloaded temp file");
        }
        result
    }

    fn run_replace(&self, scope: &EnvContext<'_>, dir: &Path, replace: &ReplaceAction) -> ExecutionResult<()> {
        let pairs: Vec<String> = replace.pairs.iter().map(|p| scope.expand(p)).collect();
        let replacer = file_replacer(&pairs, replace.regexp)?;
        for path in expand_glob(scope, dir, &replace.path, true)? {
            replacer.apply(&path)?;
        }
        Ok(())
    }

    fn run_list(&self, scope: &mut EnvContext<'_>, dir: &Path, list: &ListAction) -> ExecutionResult<()> {
        let pattern = scope.expand(&list.pattern);
        let matches = glob_expand_in(dir, &pattern, list.files_only)?;
        if list.env.is_empty() {
            for m in &matches {
                self.printer.output(m);
            }
        } else {
            let sep = list.sep.as_deref().unwrap_or(" ");
            scope.set(list.env.clone(), matches.join(sep));
        }
        Ok(())
    }

    /// Wait for background pipelines, reporting the first failure
    fn reap(&mut self) -> ExecutionResult<()> {
        let mut first = Ok(());
        for pipeline in self.background.drain(..) {
            let pid = pipeline.pid();
            if let Err(e) = pipeline.wait() {
                tracing::debug!(pid, error = %e, "background pipeline failed");
                if first.is_ok() {
                    first = Err(e.into());
                } else {
                    self.printer.error(&format!("background pipeline {}: {}", pid, e));
                }
            }
        }
        first
    }
}

/// Verify a downloaded temp file if a signature is given, then copy it to `dst`
fn install_download(tmp: &Path, dst: &Path, alg: &str, sig: &str, url: &str) -> ExecutionResult<()> {
    if !alg.is_empty() && !check_file_hash(tmp, alg, sig)? {
        return Err(ExecutionError::HashMismatch(url.to_string()));
    }
    copy_path(dst, tmp)?;
    Ok(())
}

/// Expand and glob a block pattern under `dir`; no match is an error
fn expand_glob(
    scope: &EnvContext<'_>,
    dir: &Path,
    pattern: &str,
    files_only: bool,
) -> ExecutionResult<Vec<PathBuf>> {
    let pattern = scope.expand(pattern);
    let matches = glob_expand_in(dir, &pattern, files_only)?;
    if matches.is_empty() {
        return Err(ExecutionError::NoMatch(pattern));
    }
    Ok(matches.iter().map(|m| resolve(dir, m)).collect())
}

/// Join `path` onto `dir` unless `dir` is empty or `path` is absolute
fn resolve(dir: &Path, path: &str) -> PathBuf {
    if dir.as_os_str().is_empty() {
        PathBuf::from(path)
    } else {
        dir.join(path)
    }
}
