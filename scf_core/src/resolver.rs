use std::path::Path;

use serde_json::Map;
use serde_json::Value;

use crate::Directive;
use crate::Manifest;
use crate::Options;
use crate::RegionSyntax;
use crate::ScfError;
use crate::ScfResult;
use crate::region::frozen_spans;
use crate::read_optional;
use crate::scan_directives;
use crate::scan_regions;

/// Options for one file together with the directives they were built from.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOptions {
	pub options: Options,
	/// Directives found outside generated regions, in file order.
	pub directives: Vec<Directive>,
}

/// Computes effective [`Options`] by layering, lowest precedence first:
///
/// 1. built-in defaults
/// 2. constructor overrides
/// 3. folder options from the manifest at the target root
/// 4. inline directives in the file, outside generated regions
/// 5. runtime overrides
#[derive(Debug, Clone, Default)]
pub struct OptionsResolver {
	base: Options,
}

impl OptionsResolver {
	/// Create a resolver whose base is the defaults layered with `overrides`.
	pub fn new(overrides: &Map<String, Value>) -> ScfResult<Self> {
		let base = Options::default()
			.layer(overrides)
			.map_err(|e| ScfError::config_parse("<overrides>", e))?;

		Ok(Self { base })
	}

	/// Defaults layered with the constructor overrides.
	pub fn base(&self) -> &Options {
		&self.base
	}

	/// The base layered with the folder options of the manifest in `folder`.
	pub fn folder_options(&self, folder: &Path) -> ScfResult<Options> {
		let Some(manifest) = Manifest::load(folder)? else {
			return Ok(self.base.clone());
		};

		let folder_options = manifest.folder_options();
		let path = Manifest::resolve_path(folder).unwrap_or_else(|| folder.to_path_buf());

		self.base
			.layer(&folder_options)
			.map_err(|e| ScfError::config_parse(path.display(), e))
	}

	/// Resolve the options for `file` (read from disk when it exists) under
	/// `folder`.
	pub fn resolve(
		&self,
		folder: &Path,
		file: Option<&Path>,
		runtime: &Map<String, Value>,
	) -> ScfResult<Options> {
		let content = match file {
			Some(path) => read_optional(path)?,
			None => None,
		};
		let file = file.zip(content.as_deref());

		self.resolve_content(folder, file, runtime)
	}

	/// Like [`OptionsResolver::resolve`] with the file content already read.
	pub fn resolve_content(
		&self,
		folder: &Path,
		file: Option<(&Path, &str)>,
		runtime: &Map<String, Value>,
	) -> ScfResult<Options> {
		let folder_options = self.folder_options(folder)?;
		let options = match file {
			Some((path, content)) => Self::file_options(&folder_options, path, content)?.options,
			None => folder_options,
		};
		let options = Self::with_runtime(&options, runtime)?;

		tracing::debug!(
			folder = %folder.display(),
			file = ?file.map(|(path, _)| path.display().to_string()),
			runtime_overrides = runtime.len(),
			"resolved options"
		);

		Ok(options)
	}

	/// Layer the directives found in `content` on top of `base`.
	///
	/// Directives inside generated regions belong to the generated content
	/// and are skipped.
	pub fn file_options(base: &Options, path: &Path, content: &str) -> ScfResult<FileOptions> {
		let file_name = path.display().to_string();
		let syntax = RegionSyntax::new(base, path);
		let regions = scan_regions(content, &syntax)?;
		let directives = scan_directives(
			content,
			&base.option_marker,
			&file_name,
			&frozen_spans(&regions),
		)?;

		let mut options = base.clone();
		for directive in &directives {
			options = options
				.layer(&directive.payload)
				.map_err(|e| ScfError::config_parse(&file_name, e))?;
		}

		tracing::debug!(
			file = %file_name,
			directives = directives.len(),
			regions = regions.len(),
			"loaded file configuration"
		);

		Ok(FileOptions {
			options,
			directives,
		})
	}

	/// Apply runtime overrides, the highest precedence layer.
	pub fn with_runtime(options: &Options, runtime: &Map<String, Value>) -> ScfResult<Options> {
		options
			.layer(runtime)
			.map_err(|e| ScfError::config_parse("<runtime overrides>", e))
	}
}
