//! `scf_core` is the engine behind [scf](https://github.com/scf-dev/scf). It
//! merges generated content into an existing project tree so that applying
//! the same template partial twice changes nothing, and applying it with new
//! parameters only rewrites the block it produced before.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template partial file
//!   -> Options resolver (defaults, overrides, manifest folder options, inline directives)
//!   -> Content pipeline (ordered processors, `template` renders with minijinja)
//!   -> Region scanner (finds previously generated blocks in the destination)
//!   -> Appender (region swap, append strategy or structural merge)
//!   -> Atomic write, then one manifest record per unit
//! ```
//!
//! ## Regions
//!
//! Every generated block is wrapped in markers and carries its identity:
//!
//! ```text
//! // @scf-region
//! // template: react@1.0.0
//! // partial: component
//! // param name: "Button"
//!
//! export const Button = () => null;
//! // @scf-endregion
//! ```
//!
//! Re-applying `react@1.0.0:component` replaces exactly this block. Anything
//! outside it is left byte for byte.
//!
//! ## Inline Options
//!
//! Files may carry option directives outside generated regions:
//!
//! ```text
//! // @scf-option {"appendStrategy": "replace"}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scf_core::ApplyRequest;
//! use scf_core::DirectorySource;
//! use scf_core::GenerationUnit;
//! use scf_core::Generator;
//! use scf_core::Parameters;
//!
//! let generator = Generator::new(DirectorySource::new("templates"));
//! let request = ApplyRequest::new(GenerationUnit::new("react", "1.0.0", "component"), ".")
//! 	.with_parameters(Parameters::new().with("name", "Button"));
//!
//! let report = generator.apply(&request)?;
//! if !report.is_ok() {
//! 	for (source, stage, error) in report.failures() {
//! 		eprintln!("{} failed during {stage}: {error}", source.display());
//! 	}
//! }
//! # Ok::<(), scf_core::ScfError>(())
//! ```

pub use annotation::*;
pub use appender::*;
pub use directive::*;
pub use error::*;
pub use fs::*;
pub use generator::*;
pub use manifest::*;
pub use merge::*;
pub use options::*;
pub use pipeline::*;
pub use region::*;
pub use registry::*;
pub use resolver::*;
pub use source::*;
pub use unit::*;

mod annotation;
mod appender;
mod directive;
#[allow(unused_assignments)]
mod error;
mod fs;
mod generator;
mod manifest;
mod merge;
mod options;
mod pipeline;
mod region;
mod registry;
mod resolver;
mod source;
mod unit;

#[cfg(test)]
mod __fixtures;
