use std::time::SystemTime;

/// MTime info gathered for a file.  This also models "file is absent".
/// It's not using an Option<> just because it makes the code using it easier
/// to follow.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MTime {
    Missing,
    Stamp(SystemTime),
}

/// stat() an on-disk path, producing its MTime.
pub fn stat(path: &str) -> std::io::Result<MTime> {
    Ok(match std::fs::metadata(path) {
        Ok(meta) => MTime::Stamp(meta.modified()?),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                MTime::Missing
            } else {
                return Err(err);
            }
        }
    })
}

pub fn exists(path: &str) -> bool {
    std::path::Path::new(path).exists()
}

/// Changes the process working directory, restoring the previous one when
/// dropped.  The working directory is process-wide, so the restore must
/// happen on every exit path, including errors unwinding through the scope.
pub struct WorkingDir {
    prev: std::path::PathBuf,
}

impl WorkingDir {
    pub fn enter(dir: &str) -> std::io::Result<Self> {
        let prev = std::env::current_dir()?;
        if !dir.is_empty() {
            std::env::set_current_dir(dir)?;
        }
        Ok(WorkingDir { prev })
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        // Nothing useful to do if this fails; the next build reports it.
        let _ = std::env::set_current_dir(&self.prev);
    }
}
