// Database module
// LanceDB storage and similarity search for maintenance log chunks

pub mod lancedb;

pub use self::lancedb::{IndexError, QueryFilter, RetrievedChunk, VectorIndex};
