//! Support code for e2e tests, which run redo as a binary.

mod basic;
mod failures;

pub fn redo_binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_redo"))
}

/// A redo invocation.  Build scripts find the same binary first in PATH, so
/// their `redo ifchange` talks back to it.
pub fn redo_command(args: Vec<&str>) -> std::process::Command {
    let binary = redo_binary();
    let mut path = std::ffi::OsString::from(binary.parent().expect("binary directory"));
    if let Some(inherited) = std::env::var_os("PATH") {
        path.push(":");
        path.push(inherited);
    }
    let mut cmd = std::process::Command::new(binary);
    cmd.args(args).env("PATH", path).env_remove("REDO_FD");
    cmd
}

fn print_output(out: &std::process::Output) {
    // Gross: use print! instead of writing to stdout so Rust test
    // framework can capture it.
    print!("{}", std::str::from_utf8(&out.stdout).unwrap());
    print!("{}", std::str::from_utf8(&out.stderr).unwrap());
}

pub fn assert_output_contains(out: &std::process::Output, text: &str) {
    let out = std::str::from_utf8(&out.stdout).unwrap();
    if !out.contains(text) {
        panic!(
            "assertion failed; expected output to contain {:?} but got:\n{}",
            text, out
        );
    }
}

pub fn assert_stderr_contains(out: &std::process::Output, text: &str) {
    let err = std::str::from_utf8(&out.stderr).unwrap();
    if !err.contains(text) {
        panic!(
            "assertion failed; expected stderr to contain {:?} but got:\n{}",
            text, err
        );
    }
}

/// Manages a temporary directory for invoking redo.
pub struct TestSpace {
    dir: tempfile::TempDir,
}
impl TestSpace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        Ok(TestSpace { dir })
    }

    /// A fresh space with a database already created.
    pub fn init() -> anyhow::Result<Self> {
        let space = Self::new()?;
        space.run_expect(&mut redo_command(vec!["init"]))?;
        Ok(space)
    }

    /// Absolute path of a file in the working space.
    pub fn path(&self, path: &str) -> std::path::PathBuf {
        self.dir.path().join(path)
    }

    /// Write a file into the working space, creating parent directories.
    pub fn write(&self, path: &str, content: &str) -> std::io::Result<()> {
        let path = self.path(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    /// Read a file from the working space.
    pub fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path(path).exists()
    }

    /// Set a file's mtime to a fixed number of seconds past the epoch, so
    /// changes register regardless of filesystem timestamp granularity.
    pub fn set_mtime(&self, path: &str, secs: i64) -> std::io::Result<()> {
        filetime::set_file_mtime(self.path(path), filetime::FileTime::from_unix_time(secs, 0))
    }

    /// Lines a build script appended to a log file, as a marker of which
    /// scripts ran.
    pub fn lines(&self, path: &str) -> anyhow::Result<Vec<String>> {
        if !self.exists(path) {
            return Ok(Vec::new());
        }
        let text = String::from_utf8(self.read(path)?)?;
        Ok(text.lines().map(str::to_owned).collect())
    }

    /// Invoke redo, returning process output.
    pub fn run(&self, cmd: &mut std::process::Command) -> std::io::Result<std::process::Output> {
        cmd.current_dir(self.dir.path()).output()
    }

    /// Like run, but also print output if the command failed.
    pub fn run_expect(
        &self,
        cmd: &mut std::process::Command,
    ) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if !out.status.success() {
            print_output(&out);
            anyhow::bail!("redo failed, status {}", out.status);
        }
        Ok(out)
    }

    /// Like run, but expect failure.
    pub fn run_fail(&self, cmd: &mut std::process::Command) -> anyhow::Result<std::process::Output> {
        let out = self.run(cmd)?;
        if out.status.success() {
            print_output(&out);
            anyhow::bail!("redo unexpectedly succeeded");
        }
        Ok(out)
    }

    /// Persist the temp dir locally and abort the test.  Debugging helper.
    #[allow(dead_code)]
    pub fn eject(self) -> ! {
        panic!("ejected at {:?}", self.dir.into_path());
    }
}

/// Script building `prog` from `hello.c`, logging each run to `runs`.
pub const PROG_SCRIPT: &str = "
redo ifchange hello.c
echo prog >> runs
cat hello.c > \"$1\"
";

/// Script for a target that only collects `prog`.
pub const ALL_SCRIPT: &str = "
redo ifchange prog
echo all >> runs
";
