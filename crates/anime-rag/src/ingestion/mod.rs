//! Document ingestion: directory loading and chunking

mod loader;
mod splitter;

pub use loader::DocumentLoader;
pub use splitter::TextSplitter;
