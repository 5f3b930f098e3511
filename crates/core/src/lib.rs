pub mod config;
pub mod generator;
pub mod merge;
pub mod pipeline;
pub mod walker;

pub use config::{ConfigError, GeneratorConfig};
pub use generator::Generator;
pub use merge::{MergedModel, ModelBuilder};
pub use pipeline::{Pipeline, SourceUnit};
pub use walker::FileWalker;

use cpp_harness::CppHarness;

/// A harness with the configured symbols plus the ones given on the
/// command line.
pub fn harness_for(config: &GeneratorConfig, defines: &[String]) -> CppHarness {
    CppHarness::new(config.defines.iter().chain(defines).cloned())
}
