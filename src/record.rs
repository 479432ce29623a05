//! Per-target build records: whether a target is a source or was built by a
//! script, and its modification time when last observed.

use crate::error::{Error, Result};
use crate::fs::{stat, MTime};
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Not built by us; a leaf.
    Source,
    /// Produced by a build script.
    Derived,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub kind: Kind,
    pub mtime: MTime,
}

#[derive(Default, Debug)]
pub struct Store {
    records: FxHashMap<String, Record>,
    /// Answers to is_changed() for the current invocation.  Never persisted.
    changed: FxHashMap<String, bool>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current mtime of `path` under `kind`, replacing any prior
    /// record.  A file that vanished is recorded as Missing.
    pub fn stamp(&mut self, path: &str, kind: Kind) -> Result<()> {
        let mtime = stat(path)?;
        self.insert(path.to_owned(), Record { kind, mtime });
        Ok(())
    }

    pub(crate) fn insert(&mut self, path: String, record: Record) {
        self.records.insert(path, record);
    }

    pub fn is_known(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    pub fn record(&self, path: &str) -> Option<&Record> {
        self.records.get(path)
    }

    pub fn kind_of(&self, path: &str) -> Result<Kind> {
        match self.records.get(path) {
            Some(record) => Ok(record.kind),
            None => Err(Error::UnknownTarget(path.to_owned())),
        }
    }

    /// Whether `path` changed since it was stamped.  A missing file always
    /// counts as changed; otherwise the first answer for a path is kept for
    /// the rest of the invocation.
    pub fn is_changed(&mut self, path: &str) -> Result<bool> {
        let stamped = match self.records.get(path) {
            Some(record) => record.mtime,
            None => return Err(Error::UnknownTarget(path.to_owned())),
        };
        let mtime = stat(path)?;
        if mtime == MTime::Missing {
            return Ok(true);
        }
        if let Some(&changed) = self.changed.get(path) {
            return Ok(changed);
        }
        let changed = mtime != stamped;
        self.changed.insert(path.to_owned(), changed);
        Ok(changed)
    }

    pub fn reset_changed_memo(&mut self) {
        self.changed.clear();
    }

    pub fn derived_targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.records
            .iter()
            .filter(|(_, record)| record.kind == Kind::Derived)
            .map(|(path, _)| path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> + '_ {
        self.records.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
