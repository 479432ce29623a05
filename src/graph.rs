//! The target graph: "target depends on" edges between canonical paths.

use crate::error::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Id for a target, assigned in order of first mention.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}
impl From<usize> for NodeId {
    fn from(u: usize) -> NodeId {
        NodeId(u as u32)
    }
}

/// An append-only graph between targets.  Nodes are never removed; edges
/// are only removed wholesale per source, via clear_outgoing.
#[derive(Default, Debug)]
pub struct Graph {
    /// Maps NodeId to the target path.
    names: Vec<String>,
    /// Maps NodeId to the targets it depends on, in insertion order.
    deps: Vec<Vec<NodeId>>,
    by_name: FxHashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_id(&mut self, path: &str) -> NodeId {
        if let Some(&id) = self.by_name.get(path) {
            return id;
        }
        let id = NodeId::from(self.names.len());
        self.names.push(path.to_owned());
        self.deps.push(Vec::new());
        self.by_name.insert(path.to_owned(), id);
        id
    }

    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        self.by_name.get(path).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Record that `from` depends on `to`.  Adding an existing edge is a no-op.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from = self.intern_id(from);
        let to = self.intern_id(to);
        self.add_edge(from, to);
    }

    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let deps = &mut self.deps[from.index()];
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// Drop every edge out of `from`, leaving all other edges alone.
    pub fn clear_outgoing(&mut self, from: &str) {
        let from = self.intern_id(from);
        self.deps[from.index()].clear();
    }

    pub fn dependencies(&self, id: NodeId) -> &[NodeId] {
        &self.deps[id.index()]
    }

    /// Iterate `from` and everything reachable from it, breadth first,
    /// starting with `from` itself.  Each node is yielded once, so the walk
    /// terminates on any graph.  An edge leading back to `from` is reported
    /// as a CyclicDependency error after the node it leaves from, and ends
    /// the walk.
    pub fn transitive_dependencies(&mut self, from: &str) -> Closure<'_> {
        let start = self.intern_id(from);
        let mut queue = VecDeque::new();
        queue.push_back(start);
        Closure {
            graph: self,
            start,
            queue,
            parent: FxHashMap::default(),
            seen: FxHashSet::default(),
            cycle: None,
        }
    }

    /// Every node and edge, for the graph export.
    pub fn export_edges(&self) -> Export<'_> {
        let nodes = self
            .names
            .iter()
            .enumerate()
            .map(|(id, name)| (NodeId::from(id), name.as_str()))
            .collect();
        let mut edges = Vec::new();
        for (from, deps) in self.deps.iter().enumerate() {
            for &to in deps {
                edges.push((NodeId::from(from), to));
            }
        }
        Export { nodes, edges }
    }

    /// Iterate sources that have at least one outgoing edge, with their edges.
    pub(crate) fn adjacency(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> + '_ {
        self.deps
            .iter()
            .enumerate()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(id, deps)| (NodeId::from(id), deps.as_slice()))
    }
}

/// Lazy breadth-first walk over a target's dependencies.
pub struct Closure<'a> {
    graph: &'a Graph,
    start: NodeId,
    queue: VecDeque<NodeId>,
    /// Maps each queued node to the node it was first reached from.
    parent: FxHashMap<NodeId, NodeId>,
    seen: FxHashSet<NodeId>,
    cycle: Option<Vec<String>>,
}

impl<'a> Closure<'a> {
    /// The path from the start of the walk down to `id`, then back to start.
    fn cycle_through(&self, mut id: NodeId) -> Vec<String> {
        let mut chain = vec![self.graph.name(self.start).to_owned()];
        while id != self.start {
            chain.push(self.graph.name(id).to_owned());
            id = self.parent[&id];
        }
        chain.push(self.graph.name(self.start).to_owned());
        chain.reverse();
        chain
    }
}

impl<'a> Iterator for Closure<'a> {
    type Item = Result<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(chain) = self.cycle.take() {
            self.queue.clear();
            return Some(Err(Error::CyclicDependency(chain)));
        }
        let graph = self.graph;
        while let Some(id) = self.queue.pop_front() {
            if !self.seen.insert(id) {
                continue;
            }
            for &dep in graph.dependencies(id) {
                if dep == self.start {
                    self.cycle = Some(self.cycle_through(id));
                    break;
                }
                if !self.seen.contains(&dep) {
                    self.parent.entry(dep).or_insert(id);
                    self.queue.push_back(dep);
                }
            }
            return Some(Ok(graph.name(id)));
        }
        None
    }
}

/// Node table and edge list, in the shape of the TGF export.
pub struct Export<'a> {
    pub nodes: Vec<(NodeId, &'a str)>,
    pub edges: Vec<(NodeId, NodeId)>,
}

impl std::fmt::Display for Export<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (id, name) in &self.nodes {
            writeln!(f, "{} {}", id.0, name)?;
        }
        writeln!(f, "#")?;
        for (from, to) in &self.edges {
            writeln!(f, "{} {}", from.0, to.0)?;
        }
        Ok(())
    }
}
