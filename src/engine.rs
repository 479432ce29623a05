//! The build engine: runs build scripts, records the dependencies they
//! declare, and decides which declared dependencies are stale.
//!
//! `redo`, `declare_dependencies` and `evaluate_dependency` are mutually
//! recursive: a script declaring a stale dependency causes that dependency's
//! script to run before the declaration returns.

use crate::canon::{absolute_path, strip_extension};
use crate::error::{Error, Result};
use crate::fs::{self, WorkingDir};
use crate::graph::{Export, Graph};
use crate::log::Log;
use crate::record::{Kind, Store};
use crate::script;
use rustc_hash::FxHashSet;

/// What a running build script knows about the target it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Canonical absolute path of the target.
    pub target: String,
    /// The target path without its final extension.
    pub basename: String,
    /// Path of the script building the target.
    pub script: String,
}

impl BuildContext {
    pub fn new(target: &str, script: &str) -> Self {
        BuildContext {
            target: target.to_owned(),
            basename: strip_extension(target).to_owned(),
            script: script.to_owned(),
        }
    }

    /// The directory the script runs in.
    pub fn script_dir(&self) -> &str {
        match self.script.rfind('/') {
            Some(0) => "/",
            Some(i) => &self.script[..i],
            None => "",
        }
    }
}

/// The engine side of a running script: the callback it uses to declare the
/// dependencies it consulted.
pub trait Host {
    fn declare_dependencies(&mut self, deps: &[String]) -> Result<()>;
}

/// Executes build scripts.  Implementations must return only once the
/// script has finished, and must report a failed script as BuildFailed.
pub trait Runner {
    fn execute(&self, ctx: &BuildContext, host: &mut dyn Host) -> Result<()>;
}

pub struct Engine<'a> {
    graph: Graph,
    store: Store,
    /// Scripts currently executing, innermost last.
    contexts: Vec<BuildContext>,
    /// Targets already built during this invocation.
    rebuilt: FxHashSet<String>,
    runner: &'a dyn Runner,
    log: &'a dyn Log,
}

impl<'a> Engine<'a> {
    pub fn new(graph: Graph, store: Store, runner: &'a dyn Runner, log: &'a dyn Log) -> Self {
        Engine {
            graph,
            store,
            contexts: Vec::new(),
            rebuilt: FxHashSet::default(),
            runner,
            log,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Give back the persistent state, dropping everything scoped to this
    /// invocation.
    pub fn into_parts(self) -> (Graph, Store) {
        (self.graph, self.store)
    }

    pub fn current_context(&self) -> Option<&BuildContext> {
        self.contexts.last()
    }

    /// Build `target` unconditionally, unless it was already built during
    /// this invocation.
    pub fn redo(&mut self, target: &str) -> Result<()> {
        let target = absolute_path(target)?;
        if self.rebuilt.contains(&target) {
            return Ok(());
        }
        if let Some(pos) = self.contexts.iter().position(|ctx| ctx.target == target) {
            let mut chain: Vec<String> = self.contexts[pos..]
                .iter()
                .map(|ctx| ctx.target.clone())
                .collect();
            chain.push(target);
            return Err(Error::CyclicDependency(chain));
        }

        let script = script::find_script(&target)?;
        // If the script changes, whatever it built is stale.
        self.store.stamp(&script, Kind::Source)?;
        self.graph.add_dependency(&target, &script);

        let ctx = BuildContext::new(&target, &script);
        self.contexts.push(ctx.clone());
        self.log.target(self.contexts.len(), &target);
        let result = self.run_script(&ctx);
        self.contexts.pop();
        result?;

        self.rebuilt.insert(target.clone());
        if fs::exists(&target) {
            self.store.stamp(&target, Kind::Derived)?;
        }
        Ok(())
    }

    fn run_script(&mut self, ctx: &BuildContext) -> Result<()> {
        let _cwd = WorkingDir::enter(ctx.script_dir())?;
        let runner = self.runner;
        runner.execute(ctx, self)
    }

    fn evaluate_dependency(&mut self, ctx: &BuildContext, dep: &str) -> Result<()> {
        let dep = absolute_path(dep)?;
        if dep != ctx.target {
            self.graph.add_dependency(&ctx.target, &dep);
        }

        if !self.store.is_known(&dep) {
            if fs::exists(&dep) {
                self.log.debug(&format!("{}: new source {}", ctx.target, dep));
                return self.store.stamp(&dep, Kind::Source);
            }
            return self.redo(&dep);
        }

        match self.store.kind_of(&dep)? {
            Kind::Source => {
                // Settle whether it changed for the rest of this invocation
                // before the new stamp hides it.
                self.store.is_changed(&dep)?;
                self.store.stamp(&dep, Kind::Source)
            }
            Kind::Derived => match self.changed_dependency(&dep)? {
                Some(cause) => {
                    self.log
                        .debug(&format!("{} must be rebuilt because {} changed", dep, cause));
                    self.redo(&dep)
                }
                None => Ok(()),
            },
        }
    }

    /// The first target in `dep`'s dependency closure that changed since it
    /// was stamped.  A target that was never stamped counts as changed.
    fn changed_dependency(&mut self, dep: &str) -> Result<Option<String>> {
        for node in self.graph.transitive_dependencies(dep) {
            let node = node?;
            if !self.store.is_known(node) || self.store.is_changed(node)? {
                return Ok(Some(node.to_owned()));
            }
        }
        Ok(None)
    }

    /// Delete every derived target that still exists.  Records are kept, so
    /// a later build still knows what they are.
    pub fn clean(&self) -> Result<()> {
        let mut targets: Vec<&str> = self
            .store
            .derived_targets()
            .filter(|target| fs::exists(target))
            .collect();
        targets.sort_unstable();
        for target in targets {
            self.log.clean(target);
            std::fs::remove_file(target)?;
        }
        Ok(())
    }

    pub fn export_graph(&self) -> Export<'_> {
        self.graph.export_edges()
    }
}

impl Host for Engine<'_> {
    /// Replace the current target's dependencies with `deps`, rebuilding
    /// any that are stale.
    fn declare_dependencies(&mut self, deps: &[String]) -> Result<()> {
        let ctx = match self.contexts.last() {
            Some(ctx) => ctx.clone(),
            None => {
                return Err(Error::Protocol(
                    "dependencies declared outside of a build".to_owned(),
                ))
            }
        };
        self.graph.clear_outgoing(&ctx.target);
        self.graph.add_dependency(&ctx.target, &ctx.script);
        for dep in deps {
            self.evaluate_dependency(&ctx, dep)?;
        }
        Ok(())
    }
}
