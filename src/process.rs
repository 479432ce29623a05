//! Runs build scripts as subprocesses.
//!
//! A running script declares its dependencies over a pair of pipes whose
//! file descriptors it finds in the REDO_FD environment variable, as
//! "<request-write-fd>,<reply-read-fd>".  A declaration is one path per line
//! followed by an empty line; the engine answers with one line, either "ok"
//! or "error <message>".  Declarations are served while the script runs, so
//! a declared dependency is up to date by the time the script reads it.

use crate::canon::absolute_path;
use crate::engine::{BuildContext, Host, Runner};
use crate::error::{Error, Result};
use crate::log::Log;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const FD_ENV: &str = "REDO_FD";

/// A command to execute: either a line for the shell, or an argument vector
/// run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Shell(String),
    Args(Vec<String>),
}

impl Command {
    fn to_process(&self) -> std::process::Command {
        match self {
            Command::Shell(cmdline) => {
                let mut cmd = std::process::Command::new("/bin/sh");
                cmd.arg("-c").arg(cmdline);
                cmd
            }
            Command::Args(args) => {
                let mut cmd = std::process::Command::new(&args[0]);
                cmd.args(&args[1..]);
                cmd
            }
        }
    }
}

fn quote_arg(arg: &str) -> String {
    if arg.contains(' ') || arg.contains('"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_owned()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Shell(cmdline) => f.write_str(cmdline),
            Command::Args(args) => {
                let quoted: Vec<String> = args.iter().map(|arg| quote_arg(arg)).collect();
                f.write_str(&quoted.join(" "))
            }
        }
    }
}

fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Find an executable by name.  Names containing a slash are checked as
/// given; others are looked up in each directory of `path` (or $PATH).
pub fn find_executable(name: &str, path: Option<&OsStr>) -> Option<PathBuf> {
    if name.contains('/') {
        let candidate = PathBuf::from(name);
        return is_executable(&candidate).then_some(candidate);
    }
    let path = match path {
        Some(p) => p.to_owned(),
        None => std::env::var_os("PATH")?,
    };
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// The command that runs a script: directly when it is executable,
/// otherwise through the shell.  Scripts get the target as $1 and the
/// basename as $2.
pub fn script_command(ctx: &BuildContext) -> Command {
    if !is_executable(Path::new(&ctx.script)) {
        return shell_script_command(ctx);
    }
    Command::Args(vec![
        ctx.script.clone(),
        ctx.target.clone(),
        ctx.basename.clone(),
    ])
}

fn shell_script_command(ctx: &BuildContext) -> Command {
    Command::Args(vec![
        "/bin/sh".to_owned(),
        "-e".to_owned(),
        ctx.script.clone(),
        ctx.target.clone(),
        ctx.basename.clone(),
    ])
}

/// Run a command to completion, with inherited stdio.
pub fn run(command: &Command, log: &dyn Log) -> Result<()> {
    if let Command::Args(args) = command {
        if args.is_empty() {
            return Err(Error::Protocol("empty command".to_owned()));
        }
    }
    log.command(&command.to_string());
    let status = command
        .to_process()
        .status()
        .map_err(|err| Error::BuildFailed {
            command: command.to_string(),
            status: format!("could not start: {}", err),
        })?;
    if !status.success() {
        return Err(Error::BuildFailed {
            command: command.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn check_posix(func: &str, ret: libc::c_int) -> Result<()> {
    if ret < 0 {
        let err = std::io::Error::last_os_error();
        return Err(Error::Protocol(format!("{}: {}", func, err)));
    }
    Ok(())
}

/// Create a pipe, returning (read end, write end).  The `parent` end is
/// marked close-on-exec; the other end is inherited by children spawned
/// while it is open.
fn pipe(parent_reads: bool) -> Result<(File, File)> {
    // Safety: pipe() fills in two fresh descriptors that we take ownership of.
    unsafe {
        let mut fds: [libc::c_int; 2] = [0; 2];
        check_posix("pipe", libc::pipe(fds.as_mut_ptr()))?;
        let parent = if parent_reads { fds[0] } else { fds[1] };
        check_posix(
            "fcntl",
            libc::fcntl(parent, libc::F_SETFD, libc::FD_CLOEXEC),
        )?;
        Ok((File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])))
    }
}

/// Answer declarations read from `requests` until the script closes its end.
/// After a declaration fails, further ones are refused and the first error
/// is returned once the script hangs up.
pub fn serve(requests: impl BufRead, mut replies: impl Write, host: &mut dyn Host) -> Result<()> {
    let mut failure: Option<Error> = None;
    let mut deps: Vec<String> = Vec::new();
    for line in requests.lines() {
        let line = line?;
        if !line.is_empty() {
            deps.push(line);
            continue;
        }
        let reply = if failure.is_some() {
            "error an earlier declaration failed".to_owned()
        } else {
            match host.declare_dependencies(&deps) {
                Ok(()) => "ok".to_owned(),
                Err(err) => {
                    let reply = format!("error {}", err).replace('\n', " ");
                    failure = Some(err);
                    reply
                }
            }
        };
        deps.clear();
        // If the script is already gone its exit status tells the story.
        let _ = writeln!(replies, "{}", reply).and_then(|_| replies.flush());
    }
    if let Some(err) = failure {
        return Err(err);
    }
    if !deps.is_empty() {
        return Err(Error::Protocol(format!(
            "unterminated declaration of {}",
            deps.join(" ")
        )));
    }
    Ok(())
}

/// Runs each build script as a child process of this one.
pub struct ScriptRunner<'a> {
    log: &'a dyn Log,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(log: &'a dyn Log) -> Self {
        ScriptRunner { log }
    }
}

impl Runner for ScriptRunner<'_> {
    fn execute(&self, ctx: &BuildContext, host: &mut dyn Host) -> Result<()> {
        let (requests, child_requests) = pipe(true)?;
        let (child_replies, replies) = pipe(false)?;
        let fds = format!(
            "{},{}",
            child_requests.as_raw_fd(),
            child_replies.as_raw_fd()
        );
        let spawn = |command: &Command| {
            self.log.command(&command.to_string());
            command
                .to_process()
                .env("REDO_TARGET", &ctx.target)
                .env("REDO_BASENAME", &ctx.basename)
                .env("REDO_SCRIPT", &ctx.script)
                .env(FD_ENV, &fds)
                .spawn()
        };

        let mut command = script_command(ctx);
        let spawned = match spawn(&command) {
            // An executable script without a "#!" line.
            Err(err) if err.raw_os_error() == Some(libc::ENOEXEC) => {
                command = shell_script_command(ctx);
                spawn(&command)
            }
            spawned => spawned,
        };
        let mut child = spawned.map_err(|err| Error::BuildFailed {
            command: command.to_string(),
            status: format!("could not start: {}", err),
        })?;
        // Only the child may hold these, or we would never see end of file.
        drop(child_requests);
        drop(child_replies);

        let served = serve(BufReader::new(requests), replies, host);
        let status = child.wait()?;
        served?;
        if !status.success() {
            return Err(Error::BuildFailed {
                command: command.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_fd(s: &str) -> Option<RawFd> {
    s.trim().parse::<RawFd>().ok().filter(|&fd| fd >= 0)
}

/// Script side of the protocol: declare `deps` to the engine running the
/// enclosing build.  Relative paths are taken relative to the current
/// directory.
pub fn declare_to_parent(deps: &[String]) -> Result<()> {
    let fds = std::env::var(FD_ENV).map_err(|_| {
        Error::Protocol("not running inside a build script (REDO_FD is not set)".to_owned())
    })?;
    let (w, r) = match fds.split_once(',') {
        Some((w, r)) => match (parse_fd(w), parse_fd(r)) {
            (Some(w), Some(r)) => (w, r),
            _ => return Err(Error::Protocol(format!("bad {} {:?}", FD_ENV, fds))),
        },
        None => return Err(Error::Protocol(format!("bad {} {:?}", FD_ENV, fds))),
    };

    let mut msg = String::new();
    for dep in deps {
        if dep.is_empty() || dep.contains('\n') {
            return Err(Error::Protocol(format!("cannot declare path {:?}", dep)));
        }
        msg.push_str(&absolute_path(dep)?);
        msg.push('\n');
    }
    msg.push('\n');

    // Safety: the engine handed us these descriptors for exactly this use.
    let (mut requests, replies) = unsafe { (File::from_raw_fd(w), File::from_raw_fd(r)) };
    requests.write_all(msg.as_bytes())?;
    requests.flush()?;
    let mut reply = String::new();
    BufReader::new(replies).read_line(&mut reply)?;
    match reply.trim_end() {
        "ok" => Ok(()),
        "" => Err(Error::Protocol("build engine hung up".to_owned())),
        line => match line.strip_prefix("error ") {
            Some(msg) => Err(Error::Protocol(msg.to_owned())),
            None => Err(Error::Protocol(format!("unexpected reply {:?}", line))),
        },
    }
}
