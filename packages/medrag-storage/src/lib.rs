pub mod bm25;
pub mod corpus;
pub mod models;
pub mod qdrant;
pub mod vector;

mod error;

pub use bm25::{Bm25Index, Bm25Params};
pub use corpus::Corpus;
pub use error::Error;
pub use models::{MetadataValue, Passage, PassageMetadata};
pub use qdrant::QdrantVectorIndex;
pub use vector::MemoryVectorIndex;

pub type Result<T, E = Error> = std::result::Result<T, E>;
