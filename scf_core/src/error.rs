use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ScfError {
	#[error(transparent)]
	#[diagnostic(code(scf::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse configuration in `{path}`: {reason}")]
	#[diagnostic(
		code(scf::config_parse),
		help(
			"option directives must be followed by a JSON object, e.g. `@scf-option \
			 {{\"appendStrategy\": \"replace\"}}`"
		)
	)]
	ConfigParse { path: String, reason: String },

	#[error("unknown processor: `{0}`")]
	#[diagnostic(
		code(scf::unknown_processor),
		help("built-in processors: template, raw")
	)]
	UnknownProcessor(String),

	#[error("unknown appender: `{0}`")]
	#[diagnostic(
		code(scf::unknown_appender),
		help("built-in appenders: json, yaml, toml, text")
	)]
	UnknownAppender(String),

	#[error("no configured appender accepts `{0}` content")]
	#[diagnostic(
		code(scf::unsupported_format),
		help("add `text` to the `appenders` option or set `format` explicitly")
	)]
	UnsupportedFormat(String),

	#[error("malformed region starting on line {line}: {reason}")]
	#[diagnostic(
		code(scf::malformed_region),
		help("every start marker needs a matching end marker before the next start marker")
	)]
	MalformedRegion { line: usize, reason: String },

	#[error("{count} regions are annotated as `{unit}`")]
	#[diagnostic(
		code(scf::merge_conflict),
		help("remove the duplicated region so that exactly one block carries this identity")
	)]
	MergeConflict { unit: String, count: usize },

	#[error("manifest `{path}` is corrupt: {reason}")]
	#[diagnostic(code(scf::manifest_corruption))]
	ManifestCorruption { path: String, reason: String },

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(scf::template_render))]
	TemplateRender(String),

	#[error("processor `{name}` failed: {reason}")]
	#[diagnostic(code(scf::processor))]
	Processor { name: String, reason: String },

	#[error("invalid {format} document: {reason}")]
	#[diagnostic(code(scf::structured_data))]
	StructuredData { format: String, reason: String },

	#[error("template source failed for `{key}`: {reason}")]
	#[diagnostic(code(scf::template_source))]
	TemplateSource { key: String, reason: String },

	#[error("invalid glob target `{pattern}`: {reason}")]
	#[diagnostic(code(scf::invalid_glob))]
	InvalidGlob { pattern: String, reason: String },

	#[error("merging into `{0}` failed for another source file of the unit")]
	#[diagnostic(
		code(scf::shared_target_failed),
		help("see the failure reported for the first source file targeting this destination")
	)]
	SharedTargetFailed(String),
}

impl ScfError {
	pub(crate) fn config_parse(path: impl std::fmt::Display, reason: impl ToString) -> Self {
		Self::ConfigParse {
			path: path.to_string(),
			reason: reason.to_string(),
		}
	}
}

pub type ScfResult<T> = Result<T, ScfError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
