pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod subtitle;
pub mod transcribe;

pub use config::Config;
pub use error::{AudiosubError, Result};
pub use pipeline::{
    derive_output_path, print_summary, ConversionReport, ConversionStatus, Pipeline,
    PipelineConfig, PipelineStats,
};
