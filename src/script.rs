//! Finds the build script for a target.
//!
//! For a target named `testing.c.o` the scripts tried in each directory are
//! `testing.c.o.do`, `default.c.o.do`, `default.c.do`, `default.do`.  The
//! target's own directory is tried first, then each parent up to the root.

use crate::error::{Error, Result};
use std::path::Path;

/// Script names tried, in order, for a target's file name within one
/// directory.
pub fn basename_candidates(basename: &str) -> Vec<String> {
    let mut components: Vec<&str> = basename.split('.').collect();
    let mut out = Vec::with_capacity(components.len() + 1);
    out.push(format!("{}.do", basename));
    components[0] = "default";
    for k in (1..=components.len()).rev() {
        out.push(format!("{}.do", components[..k].join(".")));
    }
    out
}

/// All script paths tried for `target`, in order: the whole basename chain in
/// the target's directory, then the chain in each ancestor directory.
pub fn candidates(target: &str) -> Vec<String> {
    let path = Path::new(target);
    let basename = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return Vec::new(),
    };
    let chain = basename_candidates(&basename);

    let mut out = Vec::new();
    let mut dir = path.parent();
    while let Some(d) = dir {
        for script in &chain {
            out.push(d.join(script).to_string_lossy().into_owned());
        }
        dir = d.parent();
    }
    out
}

/// Pick the first existing script for `target`.
pub fn find_script(target: &str) -> Result<String> {
    let tried = candidates(target);
    match tried.iter().find(|script| Path::new(script).is_file()) {
        Some(script) => Ok(script.clone()),
        None => Err(Error::ScriptNotFound {
            target: target.to_owned(),
            tried,
        }),
    }
}
