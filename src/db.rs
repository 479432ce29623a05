//! The redo database stores the target graph and build records between
//! invocations.
//!
//! Layout, all integers little-endian:
//!   "REDO" u32:version
//!   graph: u32:nodes {str}*  u32:sources {u32:source u32:n {u32:dest}*n}*
//!   store: u32:records {str u8:kind u8:tag [u64:secs u32:nanos]}*
//! where str is u32:len followed by that many bytes of UTF-8.

use crate::error::{Error, Result};
use crate::fs::MTime;
use crate::graph::{Graph, NodeId};
use crate::record::{Kind, Record, Store};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

pub const DB_FILENAME: &str = "_redo.db";

const MAGIC: &[u8; 4] = b"REDO";
pub const VERSION: u32 = 1;

/// Everything persisted between invocations.
#[derive(Default)]
pub struct State {
    pub graph: Graph,
    pub store: Store,
}

struct Writer<W: Write> {
    w: W,
}

impl<W: Write> Writer<W> {
    fn write_u8(&mut self, n: u8) -> std::io::Result<()> {
        self.w.write_all(&[n])
    }

    fn write_u32(&mut self, n: u32) -> std::io::Result<()> {
        self.w.write_all(&n.to_le_bytes())
    }

    fn write_u64(&mut self, n: u64) -> std::io::Result<()> {
        self.w.write_all(&n.to_le_bytes())
    }

    fn write_len(&mut self, len: usize) -> std::io::Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "too large"))?;
        self.write_u32(len)
    }

    fn write_str(&mut self, s: &str) -> std::io::Result<()> {
        self.write_len(s.len())?;
        self.w.write_all(s.as_bytes())
    }

    fn write_graph(&mut self, graph: &Graph) -> std::io::Result<()> {
        self.write_len(graph.len())?;
        for id in 0..graph.len() {
            self.write_str(graph.name(NodeId::from(id)))?;
        }
        let sources: Vec<_> = graph.adjacency().collect();
        self.write_len(sources.len())?;
        for (id, deps) in sources {
            self.write_u32(id.index() as u32)?;
            self.write_len(deps.len())?;
            for dep in deps {
                self.write_u32(dep.index() as u32)?;
            }
        }
        Ok(())
    }

    fn write_mtime(&mut self, mtime: MTime) -> std::io::Result<()> {
        match mtime {
            MTime::Missing => self.write_u8(0),
            MTime::Stamp(t) => {
                // Times before the epoch are clamped; we never stamp those.
                let since = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                self.write_u8(1)?;
                self.write_u64(since.as_secs())?;
                self.write_u32(since.subsec_nanos())
            }
        }
    }

    fn write_store(&mut self, store: &Store) -> std::io::Result<()> {
        let mut records: Vec<_> = store.iter().collect();
        records.sort_unstable_by_key(|(path, _)| *path);
        self.write_len(records.len())?;
        for (path, record) in records {
            self.write_str(path)?;
            self.write_u8(match record.kind {
                Kind::Source => b's',
                Kind::Derived => b'd',
            })?;
            self.write_mtime(record.mtime)?;
        }
        Ok(())
    }
}

fn corrupt<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::CorruptDatabase(msg.into()))
}

struct Reader<R: Read> {
    r: R,
}

impl<R: Read> Reader<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.r.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                corrupt("unexpected end of file")
            }
            Err(err) => Err(err.into()),
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_str(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let mut buf = Vec::new();
        // Read through take() so a garbage length cannot allocate wildly.
        (&mut self.r).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return corrupt("unexpected end of file");
        }
        match String::from_utf8(buf) {
            Ok(s) => Ok(s),
            Err(_) => corrupt("path is not UTF-8"),
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let mut magic = [0u8; 4];
        self.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return corrupt("not a redo database");
        }
        let version = self.read_u32()?;
        if version != VERSION {
            return Err(Error::IncompatibleDatabase {
                found: version,
                expected: VERSION,
            });
        }
        Ok(())
    }

    fn read_graph(&mut self) -> Result<Graph> {
        let mut graph = Graph::new();
        let nodes = self.read_u32()? as usize;
        for id in 0..nodes {
            let name = self.read_str()?;
            if graph.intern_id(&name).index() != id {
                return corrupt(format!("duplicate node {:?}", name));
            }
        }
        let check = |id: u32| -> Result<NodeId> {
            if (id as usize) < nodes {
                Ok(NodeId::from(id as usize))
            } else {
                corrupt(format!("node id {} out of range", id))
            }
        };
        let sources = self.read_u32()?;
        for _ in 0..sources {
            let from = check(self.read_u32()?)?;
            let n = self.read_u32()?;
            for _ in 0..n {
                let to = check(self.read_u32()?)?;
                graph.add_edge(from, to);
            }
        }
        Ok(graph)
    }

    fn read_mtime(&mut self) -> Result<MTime> {
        match self.read_u8()? {
            0 => Ok(MTime::Missing),
            1 => {
                let secs = self.read_u64()?;
                let nanos = self.read_u32()?;
                if nanos >= 1_000_000_000 {
                    return corrupt("bad timestamp");
                }
                let since = Duration::new(secs, nanos);
                match UNIX_EPOCH.checked_add(since) {
                    Some(t) => Ok(MTime::Stamp(t)),
                    None => corrupt("bad timestamp"),
                }
            }
            tag => corrupt(format!("bad mtime tag {}", tag)),
        }
    }

    fn read_store(&mut self) -> Result<Store> {
        let mut store = Store::new();
        let records = self.read_u32()?;
        for _ in 0..records {
            let path = self.read_str()?;
            let kind = match self.read_u8()? {
                b's' => Kind::Source,
                b'd' => Kind::Derived,
                k => return corrupt(format!("bad kind {}", k)),
            };
            let mtime = self.read_mtime()?;
            store.insert(path, Record { kind, mtime });
        }
        Ok(store)
    }
}

/// Serialize the state.  The changed-status memo is cleared here, at the
/// boundary between invocations.
pub fn encode(w: impl Write, state: &mut State) -> std::io::Result<()> {
    state.store.reset_changed_memo();
    let mut w = Writer { w };
    w.w.write_all(MAGIC)?;
    w.write_u32(VERSION)?;
    w.write_graph(&state.graph)?;
    w.write_store(&state.store)?;
    w.w.flush()
}

/// Deserialize state.  Nothing is returned unless the whole file parsed.
pub fn decode(r: impl Read) -> Result<State> {
    let mut r = Reader { r };
    r.read_header()?;
    let graph = r.read_graph()?;
    let store = r.read_store()?;
    let mut rest = [0u8; 1];
    if r.r.read(&mut rest)? != 0 {
        return corrupt("trailing data");
    }
    Ok(State { graph, store })
}

pub fn load(path: &Path) -> Result<State> {
    let f = File::open(path)?;
    decode(BufReader::new(f))
}

/// Write the state to `path`.  The data goes to a temporary file that is
/// renamed into place, so an interrupted write leaves the old database.
pub fn save(path: &Path, state: &mut State) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let f = File::create(&tmp)?;
        let mut w = BufWriter::new(f);
        encode(&mut w, state)?;
        w.into_inner().map_err(|err| err.into_error())?.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Create a new empty database in `dir`, failing if one exists.
pub fn init(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(DB_FILENAME);
    let f = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                std::io::Error::new(
                    err.kind(),
                    format!("database file {} already exists", path.display()),
                )
            } else {
                err
            }
        })?;
    let mut w = BufWriter::new(f);
    encode(&mut w, &mut State::default())?;
    w.flush()?;
    Ok(path)
}

/// Look for the database in `dir` and then each of its ancestors.
pub fn find(dir: &Path) -> Result<PathBuf> {
    let mut tried = Vec::new();
    let mut cur = Some(dir);
    while let Some(d) = cur {
        let path = d.join(DB_FILENAME);
        if path.is_file() {
            return Ok(path);
        }
        tried.push(path.to_string_lossy().into_owned());
        cur = d.parent();
    }
    Err(Error::DatabaseMissing { tried })
}
