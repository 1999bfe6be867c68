//! Document ingestion pipeline: fetch, read, normalize, chunk, persist

pub mod chunker;
pub mod normalize;
pub mod pipeline;
pub mod reader;
pub mod source;

pub use chunker::{ChunkText, SentenceWindowChunker};
pub use normalize::{normalizer_for, TextNormalizer};
pub use pipeline::{BuildOutcome, BuildStage, IngestionPipeline};
pub use reader::read_document;
pub use source::{SourceFetcher, SourceLocator};
