//! Document ingestion pipeline: chunking, processing, events, and the job queue.

pub mod chunking;
pub mod events;
pub mod queue;
pub mod service;
pub mod types;

pub use chunking::{TextChunk, chunk_text};
pub use events::{EventPublisher, PipelineEvent, TracingEventPublisher};
pub use queue::{IngestJob, JobQueue};
pub use service::ProcessingService;
pub use types::{ChunkingError, ProcessingError, ProcessingReport, SearchHit};
