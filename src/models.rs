mod answer_record;
mod chunk;
mod embedding;

pub use answer_record::{AnswerRecord, SourceSet, collect_sources};
pub use chunk::{Chunk, Metadata, SOURCE_KEY};
pub use embedding::Embedding;
