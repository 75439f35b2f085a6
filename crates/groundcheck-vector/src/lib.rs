//! Chunk stores for the retriever.
//!
//! [`InMemoryChunkStore`] is always available. The LanceDB store and its
//! ingestion writer live behind the `lance` feature.

mod memory;

#[cfg(feature = "lance")]
pub mod schema;
#[cfg(feature = "lance")]
mod search;
#[cfg(feature = "lance")]
pub mod table;
#[cfg(feature = "lance")]
mod writer;

pub use memory::InMemoryChunkStore;

#[cfg(feature = "lance")]
pub use search::LanceChunkStore;
#[cfg(feature = "lance")]
pub use writer::LanceChunkWriter;
