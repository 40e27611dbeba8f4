mod chunk;
mod error;
pub(crate) mod event;
mod json;
mod options;
mod scheduler;
pub(crate) mod session;
mod source;
mod transport;
mod upload;

pub use chunk::{plan, ChunkDescriptor, ChunkIterator};
pub use error::*;
pub use event::{Emitter, Event, Progress};
pub use json::*;
pub use options::*;
pub use scheduler::Scheduler;
pub use session::{to_ranges, UploadSession};
pub use source::{ChunkSource, MemorySource};
pub use transport::{ChunkResult, HttpTransport, Transport};
pub use upload::UploadOrchestrator;

pub const SESSION_ROUTE: &str = "sessions";
pub const PART_NAME: &str = "chunk";
