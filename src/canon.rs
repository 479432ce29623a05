//! Path canonicalization.
//!
//! Targets are keyed by canonical absolute path strings, so two spellings of
//! the same file ("sub/../prog", "./prog") refer to the same target.

/// Lexically canonicalize a path, removing redundant components.
/// Does not access the disk, so symlinks are not resolved; this only
/// simplifies things like "foo/./bar" => "foo/bar" and "foo/../bar" => "bar".
/// ".." at the root of an absolute path stays at the root.
pub fn canon_path<T: AsRef<str>>(inpath: T) -> String {
    let path = inpath.as_ref();
    let absolute = path.starts_with('/');
    let mut parents = 0;
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if components.pop().is_none() && !absolute {
                    parents += 1;
                }
            }
            c => components.push(c),
        }
    }

    let mut out = String::with_capacity(path.len());
    if absolute {
        out.push('/');
    }
    for _ in 0..parents {
        out.push_str("../");
    }
    for c in components {
        out.push_str(c);
        out.push('/');
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Make a path absolute against the current working directory and
/// canonicalize it.  This is the sole way raw paths become target names.
pub fn absolute_path(path: &str) -> std::io::Result<String> {
    if path.starts_with('/') {
        return Ok(canon_path(path));
    }
    let cwd = std::env::current_dir()?;
    Ok(canon_path(format!("{}/{}", cwd.to_string_lossy(), path)))
}

/// The path with its final "."-delimited extension removed, as exposed to
/// build scripts.  Dots in directory names and leading dots of hidden files
/// do not count as extensions.
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..name_start + dot],
    }
}
