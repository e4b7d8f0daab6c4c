use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::ScfError;
use crate::ScfResult;
use crate::read_optional;

/// Template level configuration (`template.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
	pub name: String,
	pub version: String,
	/// Option overrides shared by every partial of the template.
	pub options: Map<String, Value>,
}

/// Partial level configuration (`partial.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
	pub description: Option<String>,
	/// Option overrides for this partial, layered over the template's.
	pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialDefinition {
	pub config: PartialConfig,
	/// Directory whose files make up the partial. Paths below it mirror the
	/// target paths.
	pub content_root: PathBuf,
}

/// Where template and partial definitions come from.
///
/// Results must be stable for a given key during one run.
pub trait TemplateSource: Send + Sync {
	fn get_template(&self, name: &str, version: &str) -> ScfResult<TemplateConfig>;

	fn get_partial(&self, path: &str, template: &str, version: &str)
	-> ScfResult<PartialDefinition>;
}

/// Templates stored on disk:
///
/// ```text
/// <root>/<name>/<version>/template.json
/// <root>/<name>/<version>/partials/<partial>/partial.json
/// <root>/<name>/<version>/partials/<partial>/files/...
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
	root: PathBuf,
}

impl DirectorySource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn template_dir(&self, name: &str, version: &str) -> PathBuf {
		self.root.join(name).join(version)
	}
}

fn read_json_config<T>(path: &Path, key: &str) -> ScfResult<Option<T>>
where
	T: for<'de> Deserialize<'de>,
{
	let Some(content) = read_optional(path)? else {
		return Ok(None);
	};

	serde_json::from_str(&content)
		.map(Some)
		.map_err(|e| {
			ScfError::TemplateSource {
				key: key.to_string(),
				reason: format!("{}: {e}", path.display()),
			}
		})
}

impl TemplateSource for DirectorySource {
	fn get_template(&self, name: &str, version: &str) -> ScfResult<TemplateConfig> {
		let key = format!("{name}@{version}");
		let dir = self.template_dir(name, version);
		if !dir.is_dir() {
			return Err(ScfError::TemplateSource {
				key,
				reason: format!("`{}` does not exist", dir.display()),
			});
		}

		let mut config: TemplateConfig =
			read_json_config(&dir.join("template.json"), &key)?.unwrap_or_default();
		if config.name.is_empty() {
			config.name = name.to_string();
		}
		if config.version.is_empty() {
			config.version = version.to_string();
		}

		Ok(config)
	}

	fn get_partial(
		&self,
		path: &str,
		template: &str,
		version: &str,
	) -> ScfResult<PartialDefinition> {
		let key = format!("{template}@{version}:{path}");
		let dir = self.template_dir(template, version).join("partials").join(path);
		let content_root = dir.join("files");
		if !content_root.is_dir() {
			return Err(ScfError::TemplateSource {
				key,
				reason: format!("`{}` does not exist", content_root.display()),
			});
		}

		let config = read_json_config(&dir.join("partial.json"), &key)?.unwrap_or_default();

		Ok(PartialDefinition {
			config,
			content_root,
		})
	}
}

/// Memoizes another source for the lifetime of this value.
#[derive(Debug)]
pub struct CachedSource<S> {
	inner: S,
	templates: Mutex<HashMap<(String, String), TemplateConfig>>,
	partials: Mutex<HashMap<(String, String, String), PartialDefinition>>,
}

impl<S: TemplateSource> CachedSource<S> {
	pub fn new(inner: S) -> Self {
		Self {
			inner,
			templates: Mutex::new(HashMap::new()),
			partials: Mutex::new(HashMap::new()),
		}
	}

	pub fn inner(&self) -> &S {
		&self.inner
	}
}

impl<S: TemplateSource> TemplateSource for CachedSource<S> {
	fn get_template(&self, name: &str, version: &str) -> ScfResult<TemplateConfig> {
		let key = (name.to_string(), version.to_string());
		if let Some(config) = self
			.templates
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&key)
		{
			return Ok(config.clone());
		}

		let config = self.inner.get_template(name, version)?;
		self.templates
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key, config.clone());

		Ok(config)
	}

	fn get_partial(
		&self,
		path: &str,
		template: &str,
		version: &str,
	) -> ScfResult<PartialDefinition> {
		let key = (template.to_string(), version.to_string(), path.to_string());
		if let Some(definition) = self
			.partials
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&key)
		{
			return Ok(definition.clone());
		}

		let definition = self.inner.get_partial(path, template, version)?;
		self.partials
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key, definition.clone());

		Ok(definition)
	}
}
