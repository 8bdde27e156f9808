pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod layout;
pub mod pipeline;
pub mod quarantine;
pub mod run_date;
pub mod store;

pub use config::Config;
pub use engine::{process_one, ProcessOutcome};
pub use error::{AudiochunkError, ErrorKind, Result};
pub use pipeline::{print_summary, run_batch, BatchSummary, PipelineContext};
pub use run_date::RunDate;
