pub mod queue;
pub mod types;

pub use queue::IngestQueue;
pub use types::{ActionType, ClassifiedItem, IngestItem, IngestMeta, Source};
