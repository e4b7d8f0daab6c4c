use std::path::PathBuf;

use serde_json::Map;
use serde_json::Value;

use crate::GenerationUnit;
use crate::Options;
use crate::Parameters;
use crate::ScfError;
use crate::ScfResult;

/// Per-file state threaded through the content pipeline.
///
/// Each stage receives the context by value and hands back a possibly updated
/// copy, so a stage can change the effective target path or leave values in
/// `scratch` for later stages.
#[derive(Debug, Clone)]
pub struct Context {
	pub unit: GenerationUnit,
	pub parameters: Parameters,
	/// Target path relative to the target root.
	pub target_path: PathBuf,
	/// Directory holding the partial's source files.
	pub template_root: PathBuf,
	pub options: Options,
	/// Free-form values shared between stages. Exposed to templates as top
	/// level variables.
	pub scratch: Map<String, Value>,
	/// Logging capability for this file. Events emitted inside it carry the
	/// unit and the source file.
	pub span: tracing::Span,
}

impl Context {
	/// Variables available to templates: every parameter, every scratch
	/// value and an `scf` object describing the unit being applied.
	pub fn template_variables(&self) -> minijinja::Value {
		let mut variables = Map::new();

		for (name, value) in self.parameters.iter() {
			variables.insert(name.clone(), value.clone());
		}

		for (name, value) in &self.scratch {
			variables.insert(name.clone(), value.clone());
		}

		let parameters = serde_json::to_value(&self.parameters).unwrap_or_default();
		variables.insert(
			"scf".to_string(),
			serde_json::json!({
				"template": self.unit.template,
				"version": self.unit.version,
				"partial": self.unit.partial,
				"target": self.target_path.to_string_lossy(),
				"parameters": parameters,
			}),
		);

		minijinja::Value::from_serialize(&variables)
	}
}

/// A transformation stage of the content pipeline.
pub trait Processor: Send + Sync {
	/// The name used to select this processor in the `processors` option.
	fn name(&self) -> &str;

	/// Transform `input`, returning the (possibly updated) context and the
	/// stage output.
	fn process(&self, context: Context, input: &str) -> ScfResult<(Context, String)>;
}

/// Renders its input as a minijinja template. Undefined variables are an
/// error.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateProcessor;

impl Processor for TemplateProcessor {
	fn name(&self) -> &'static str {
		"template"
	}

	fn process(&self, context: Context, input: &str) -> ScfResult<(Context, String)> {
		let rendered = render_template(input, &context.template_variables())?;
		Ok((context, rendered))
	}
}

/// Passes its input through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawProcessor;

impl Processor for RawProcessor {
	fn name(&self) -> &'static str {
		"raw"
	}

	fn process(&self, context: Context, input: &str) -> ScfResult<(Context, String)> {
		Ok((context, input.to_string()))
	}
}

/// Render `source` through minijinja with the given variables.
///
/// Content without template syntax is returned as is.
pub fn render_template(source: &str, variables: &minijinja::Value) -> ScfResult<String> {
	if !has_template_syntax(source) {
		return Ok(source.to_string());
	}

	let mut env = minijinja::Environment::new();
	env.set_keep_trailing_newline(true);
	env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
	env.add_template("__inline__", source)
		.map_err(|e| ScfError::TemplateRender(e.to_string()))?;

	let template = env
		.get_template("__inline__")
		.map_err(|e| ScfError::TemplateRender(e.to_string()))?;

	template
		.render(variables)
		.map_err(|e| ScfError::TemplateRender(e.to_string()))
}

/// Check whether content contains minijinja template syntax.
pub(crate) fn has_template_syntax(content: &str) -> bool {
	content.contains("{{") || content.contains("{%") || content.contains("{#")
}

/// Run `input` through `processors` in order. Every stage receives the
/// trimmed output of the one before it and the final output is trimmed too.
pub fn run_pipeline(
	processors: &[Box<dyn Processor>],
	context: Context,
	input: &str,
) -> ScfResult<(Context, String)> {
	let mut context = context;
	let mut output = input.trim().to_string();

	for processor in processors {
		context.span.in_scope(|| {
			tracing::debug!(processor = processor.name(), "running pipeline stage");
		});

		let (next_context, next_output) = processor.process(context, &output)?;
		context = next_context;
		output = next_output.trim().to_string();
	}

	Ok((context, output))
}
