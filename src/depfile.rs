//! Parsing of Makefile-syntax dependency files, as emitted by `gcc -MD`.

use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub struct Deps {
    pub target: String,
    pub deps: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    msg: String,
    ofs: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at byte {}: {}", self.ofs, self.msg)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

struct Scanner<'a> {
    buf: &'a [u8],
    ofs: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.ofs).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.buf.get(self.ofs + 1).copied()
    }

    fn error<T>(&self, msg: &str) -> ParseResult<T> {
        Err(ParseError {
            msg: msg.to_owned(),
            ofs: self.ofs,
        })
    }

    /// Skip spaces and backslashed newlines.
    fn skip_spaces(&mut self) {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(b' ' | b'\t'), _) => self.ofs += 1,
                (Some(b'\\'), Some(b'\n')) => self.ofs += 2,
                (Some(b'\\'), Some(b'\r')) if self.buf.get(self.ofs + 2) == Some(&b'\n') => {
                    self.ofs += 3
                }
                _ => return,
            }
        }
    }

    fn skip_newlines(&mut self) {
        while let Some(b'\n' | b'\r') = self.peek() {
            self.ofs += 1;
        }
    }

    fn read_path(&mut self) -> ParseResult<Option<String>> {
        self.skip_spaces();
        let mut path = Vec::new();
        loop {
            match (self.peek(), self.peek2()) {
                (None | Some(b' ' | b'\t' | b'\n' | b'\r'), _) => break,
                // A colon ends the target, unless it is part of a Windows
                // drive letter or a path.
                (Some(b':'), next) if !matches!(next, Some(b'\\' | b'/')) => break,
                (Some(b'\\'), Some(b'\n' | b'\r')) => break,
                (Some(b'\\'), Some(c @ (b' ' | b'#' | b'\\'))) => {
                    path.push(c);
                    self.ofs += 2;
                }
                (Some(b'$'), Some(b'$')) => {
                    path.push(b'$');
                    self.ofs += 2;
                }
                (Some(c), _) => {
                    path.push(c);
                    self.ofs += 1;
                }
            }
        }
        if path.is_empty() {
            return Ok(None);
        }
        match String::from_utf8(path) {
            Ok(path) => Ok(Some(path)),
            Err(_) => self.error("path is not UTF-8"),
        }
    }

    fn parse_rule(&mut self) -> ParseResult<Deps> {
        let target = match self.read_path()? {
            None => return self.error("expected file"),
            Some(target) => target,
        };
        self.skip_spaces();
        if self.peek() != Some(b':') {
            return self.error("expected ':'");
        }
        self.ofs += 1;
        let mut deps = Vec::new();
        while let Some(dep) = self.read_path()? {
            deps.push(dep);
        }
        match self.peek() {
            None | Some(b'\n' | b'\r') => {}
            _ => return self.error("expected newline"),
        }
        Ok(Deps { target, deps })
    }
}

/// Parse every rule in `buf`.
pub fn parse(buf: &[u8]) -> ParseResult<Vec<Deps>> {
    let mut scanner = Scanner { buf, ofs: 0 };
    let mut rules = Vec::new();
    loop {
        scanner.skip_newlines();
        scanner.skip_spaces();
        if scanner.peek().is_none() {
            break;
        }
        rules.push(scanner.parse_rule()?);
    }
    Ok(rules)
}

/// The dependencies named in a depfile that exist on disk, in order and
/// without repeats.
pub fn existing_deps(buf: &[u8]) -> ParseResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for rule in parse(buf)? {
        for dep in rule.deps {
            if !out.contains(&dep) && std::path::Path::new(&dep).exists() {
                out.push(dep);
            }
        }
    }
    Ok(out)
}
