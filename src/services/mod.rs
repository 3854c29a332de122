pub mod budget;
pub mod classifier;
pub mod content_index;
pub mod llm;
pub mod loader;
pub mod locator;
pub mod offline;
pub mod prompt;
pub mod report;
pub mod sampler;

pub use report::{GeneratedReport, ReportError, ReportPipeline, SynthesisMode};
