pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod stages;
pub mod stats;

pub use error::{PipelineError, Result};
