#[macro_use]
extern crate log;

mod common;
mod native;

#[cfg(test)]
mod mock;

pub use common::*;
pub use native::{upload, FileSource};
pub use tokio_util::sync::CancellationToken;
