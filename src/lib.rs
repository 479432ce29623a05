pub mod canon;
pub mod db;
pub mod depfile;
pub mod engine;
pub mod error;
pub mod fs;
pub mod graph;
pub mod log;
pub mod process;
pub mod record;
pub mod run;
pub mod script;

pub use error::{Error, Result};

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
