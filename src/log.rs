//! Build logging, for the purpose of display to the user.
//!
//! The logger is constructed once by the command-line front end and handed
//! to the engine by reference.

#[cfg(test)]
use std::cell::RefCell;

/// Trait for build log notifications.
pub trait Log {
    /// A derived target is being deleted by "clean".
    fn clean(&self, target: &str);

    /// A target's script is about to run.  `depth` is the nesting depth of
    /// the build, 1 for the requested target.
    fn target(&self, depth: usize, target: &str);

    /// A command line is about to run.
    fn command(&self, cmdline: &str);

    fn debug(&self, msg: &str);

    fn error(&self, msg: &str);
}

/// Log implementation that prints to the console, filtered by level.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLog {
    clean: bool,
    target: bool,
    command: bool,
    debug: bool,
}

impl ConsoleLog {
    /// 0 is quiet, 1 traces targets and cleaning, 2 adds commands, 3 adds
    /// debug output.
    pub fn from_level(level: u32) -> Self {
        ConsoleLog {
            clean: level >= 1,
            target: level >= 1,
            command: level >= 2,
            debug: level >= 3,
        }
    }
}

impl Log for ConsoleLog {
    fn clean(&self, target: &str) {
        if self.clean {
            println!("Cleaning {}", target);
        }
    }

    fn target(&self, depth: usize, target: &str) {
        if self.target {
            println!("{}{}", " ".repeat(depth), target);
        }
    }

    fn command(&self, cmdline: &str) {
        if self.command {
            println!("{}", cmdline);
        }
    }

    fn debug(&self, msg: &str) {
        if self.debug {
            println!("> {}", msg);
        }
    }

    fn error(&self, msg: &str) {
        eprintln!("redo: error: {}", msg);
    }
}

/// Log implementation that remembers every message, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub lines: RefCell<Vec<String>>,
}

#[cfg(test)]
impl RecordingLog {
    pub fn contains(&self, line: &str) -> bool {
        self.lines.borrow().iter().any(|l| l == line)
    }

    fn push(&self, line: String) {
        self.lines.borrow_mut().push(line);
    }
}

#[cfg(test)]
impl Log for RecordingLog {
    fn clean(&self, target: &str) {
        self.push(format!("clean {}", target));
    }

    fn target(&self, depth: usize, target: &str) {
        self.push(format!("target {} {}", depth, target));
    }

    fn command(&self, cmdline: &str) {
        self.push(format!("command {}", cmdline));
    }

    fn debug(&self, msg: &str) {
        self.push(format!("debug {}", msg));
    }

    fn error(&self, msg: &str) {
        self.push(format!("error {}", msg));
    }
}
