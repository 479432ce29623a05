use anyhow::{anyhow, Context};
use argh::FromArgs;
use std::path::PathBuf;

use crate::{
    db, depfile,
    engine::Engine,
    log::{ConsoleLog, Log},
    process::{self, ScriptRunner},
};

#[derive(FromArgs)]
/// Incremental builds driven by per-target build scripts.
struct Args {
    /// log verbosity: 0 quiet, 1 targets, 2 commands, 3 debug [default=1]
    #[argh(option, default = "1")]
    logging_level: u32,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Init(InitArgs),
    Clean(CleanArgs),
    Build(BuildArgs),
    Tgf(TgfArgs),
    Ifchange(IfchangeArgs),
    Which(WhichArgs),
    Cmd(CmdArgs),
}

#[derive(FromArgs)]
/// create the build database in the current directory
#[argh(subcommand, name = "init")]
struct InitArgs {}

#[derive(FromArgs)]
/// delete every built target
#[argh(subcommand, name = "clean")]
struct CleanArgs {}

#[derive(FromArgs)]
/// build a target
#[argh(subcommand, name = "build")]
struct BuildArgs {
    /// the target to build
    #[argh(positional)]
    target: String,
}

#[derive(FromArgs)]
/// print the dependency graph in Trivial Graph Format
#[argh(subcommand, name = "tgf")]
struct TgfArgs {}

#[derive(FromArgs)]
/// declare the dependencies of the target being built (in build scripts)
#[argh(subcommand, name = "ifchange")]
struct IfchangeArgs {
    /// also declare the existing dependencies named in a Makefile depfile
    #[argh(option)]
    depfile: Option<String>,

    /// dependencies
    #[argh(positional)]
    deps: Vec<String>,
}

#[derive(FromArgs)]
/// print the path of an executable found in PATH
#[argh(subcommand, name = "which")]
struct WhichArgs {
    /// executable name
    #[argh(positional)]
    name: String,
}

#[derive(FromArgs)]
/// run a command, logging it at level 2 and failing with its exit status;
/// put "--" before commands that take options
#[argh(subcommand, name = "cmd")]
struct CmdArgs {
    /// run the arguments, joined with spaces, as one shell command line
    #[argh(switch)]
    shell: bool,

    /// command and arguments
    #[argh(positional, greedy)]
    args: Vec<String>,
}

/// Load the database found from the current directory.
fn open() -> anyhow::Result<(PathBuf, db::State)> {
    let cwd = std::env::current_dir()?;
    let path = db::find(&cwd)?;
    let state = db::load(&path).with_context(|| format!("load {}", path.display()))?;
    Ok((path, state))
}

fn build(target: &str, log: &dyn Log) -> anyhow::Result<()> {
    let (path, state) = open()?;
    let runner = ScriptRunner::new(log);
    let mut engine = Engine::new(state.graph, state.store, &runner, log);
    // A failed build leaves the database as it was.
    engine.redo(target)?;
    let (graph, store) = engine.into_parts();
    db::save(&path, &mut db::State { graph, store })?;
    Ok(())
}

fn clean(log: &dyn Log) -> anyhow::Result<()> {
    let (path, state) = open()?;
    let runner = ScriptRunner::new(log);
    let engine = Engine::new(state.graph, state.store, &runner, log);
    engine.clean()?;
    let (graph, store) = engine.into_parts();
    db::save(&path, &mut db::State { graph, store })?;
    Ok(())
}

fn tgf(log: &dyn Log) -> anyhow::Result<()> {
    let (_, state) = open()?;
    let runner = ScriptRunner::new(log);
    let engine = Engine::new(state.graph, state.store, &runner, log);
    print!("{}", engine.export_graph());
    Ok(())
}

fn ifchange(args: IfchangeArgs) -> anyhow::Result<()> {
    let mut deps = args.deps;
    if let Some(path) = args.depfile {
        let buf = std::fs::read(&path).with_context(|| format!("read {}", path))?;
        let named = depfile::existing_deps(&buf).with_context(|| format!("parse {}", path))?;
        deps.extend(named);
    }
    process::declare_to_parent(&deps)?;
    Ok(())
}

fn run_command(command: Command, log: &dyn Log) -> anyhow::Result<()> {
    match command {
        Command::Init(_) => {
            let cwd = std::env::current_dir()?;
            let path = db::init(&cwd)?;
            log.debug(&format!("created {}", path.display()));
        }
        Command::Clean(_) => clean(log)?,
        Command::Build(args) => build(&args.target, log)?,
        Command::Tgf(_) => tgf(log)?,
        Command::Ifchange(args) => ifchange(args)?,
        Command::Which(args) => {
            let path = process::find_executable(&args.name, None)
                .ok_or_else(|| anyhow!("{} not found in PATH", args.name))?;
            println!("{}", path.display());
        }
        Command::Cmd(args) => {
            let command = if args.shell {
                process::Command::Shell(args.args.join(" "))
            } else {
                process::Command::Args(args.args)
            };
            process::run(&command, log)?;
        }
    }
    Ok(())
}

pub fn run() -> anyhow::Result<i32> {
    let args: Args = argh::from_env();
    let log = ConsoleLog::from_level(args.logging_level);
    match run_command(args.command, &log) {
        Ok(()) => Ok(0),
        Err(err) => {
            log.error(&format!("{:#}", err));
            Ok(1)
        }
    }
}
