use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use scf_core::GenerationUnit;
use serde_json::Map;
use serde_json::Value;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Apply template partials to a project, idempotently.",
	long_about = "scf merges generated files into an existing project. Every generated block \
	              is wrapped in annotated region markers so that re-applying a partial only \
	              rewrites the block it produced before and leaves your edits alone.\n\nQuick \
	              start:\n  scf apply react@1.0.0:component --param name=Button\n  scf regions \
	              src/Button.tsx\n  scf options src/Button.tsx"
)]
pub struct ScfCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory. The manifest lives here.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output. Debug logs are written to stderr.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Apply a template partial to the project.
	///
	/// Renders every file of the partial, merges it into the matching
	/// destination and records the application in the manifest once all
	/// files succeed. Re-applying the same partial is a no-op.
	Apply {
		/// The unit to apply, as `template@version:partial`.
		#[arg(value_parser = parse_unit)]
		unit: GenerationUnit,

		/// Directory holding templates as `<name>/<version>/partials/<partial>`.
		#[arg(long, default_value = "templates")]
		templates: PathBuf,

		/// A template parameter as `name=value`. Values are parsed as JSON
		/// when possible and used as plain strings otherwise.
		#[arg(long = "param", value_parser = parse_key_value)]
		params: Vec<(String, Value)>,

		/// A runtime option override as `name=value`, e.g.
		/// `appendStrategy=replace`. Overrides every other option source.
		#[arg(long = "option", value_parser = parse_key_value)]
		options: Vec<(String, Value)>,

		/// Process files one at a time, in order.
		#[arg(long, default_value_t = false)]
		debug: bool,

		/// Maximum number of worker threads. Defaults to the available
		/// parallelism.
		#[arg(long)]
		workers: Option<usize>,
	},
	/// List the generated regions found in a file.
	Regions {
		/// File to scan.
		file: PathBuf,
	},
	/// Print the effective options for a file as JSON.
	///
	/// Layers the built-in defaults, the manifest's folder options, the
	/// file's inline directives and any `--option` overrides.
	Options {
		/// File whose directives are applied. Omit to print the folder
		/// options.
		file: Option<PathBuf>,

		/// A runtime option override as `name=value`.
		#[arg(long = "option", value_parser = parse_key_value)]
		options: Vec<(String, Value)>,
	},
}

fn parse_unit(value: &str) -> Result<GenerationUnit, String> {
	value.parse()
}

/// Parse `name=value`, reading the value as JSON and falling back to a
/// string.
pub fn parse_key_value(input: &str) -> Result<(String, Value), String> {
	let (name, raw) = input
		.split_once('=')
		.ok_or_else(|| format!("expected `name=value`, got `{input}`"))?;
	let name = name.trim();
	if name.is_empty() {
		return Err(format!("missing name in `{input}`"));
	}

	let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
	Ok((name.to_string(), value))
}

/// Collect parsed `name=value` pairs into a JSON object.
pub fn into_map(pairs: &[(String, Value)]) -> Map<String, Value> {
	pairs.iter().cloned().collect()
}
