use std::collections::BTreeMap;
use std::fmt;

use crate::Appender;
use crate::DataFormat;
use crate::Processor;
use crate::RawProcessor;
use crate::ScfError;
use crate::ScfResult;
use crate::StructuredAppender;
use crate::TemplateProcessor;
use crate::TextAppender;

type Factory<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// Name to constructor table for pluggable capabilities.
pub struct Registry<T: ?Sized> {
	factories: BTreeMap<String, Factory<T>>,
}

pub type ProcessorRegistry = Registry<dyn Processor>;
pub type AppenderRegistry = Registry<dyn Appender>;

impl<T: ?Sized> Default for Registry<T> {
	fn default() -> Self {
		Self {
			factories: BTreeMap::new(),
		}
	}
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("names", &self.factories.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl<T: ?Sized> Registry<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a constructor under `name`, replacing any previous one.
	pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
	where
		F: Fn() -> Box<T> + Send + Sync + 'static,
	{
		self.factories.insert(name.into(), Box::new(factory));
		self
	}

	pub fn contains(&self, name: &str) -> bool {
		self.factories.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.factories.keys().map(String::as_str)
	}

	/// Construct the capability registered under `name`.
	pub fn build(&self, name: &str) -> Option<Box<T>> {
		self.factories.get(name).map(|factory| factory())
	}

	/// Construct every named capability in order. The first unknown name is
	/// returned as the error.
	pub fn build_all(&self, names: &[String]) -> Result<Vec<Box<T>>, String> {
		names
			.iter()
			.map(|name| self.build(name).ok_or_else(|| name.clone()))
			.collect()
	}
}

impl Registry<dyn Processor> {
	/// Registry holding `template` and `raw`.
	pub fn with_builtin_processors() -> Self {
		let mut registry = Self::new();
		registry
			.register("template", || Box::new(TemplateProcessor))
			.register("raw", || Box::new(RawProcessor));
		registry
	}

	/// The processors named by the `processors` option.
	pub fn processors(&self, names: &[String]) -> ScfResult<Vec<Box<dyn Processor>>> {
		self.build_all(names).map_err(ScfError::UnknownProcessor)
	}
}

impl Registry<dyn Appender> {
	/// Registry holding `json`, `yaml`, `toml` and `text`.
	pub fn with_builtin_appenders() -> Self {
		let mut registry = Self::new();
		registry
			.register("json", || Box::new(StructuredAppender::new(DataFormat::Json)))
			.register("yaml", || Box::new(StructuredAppender::new(DataFormat::Yaml)))
			.register("toml", || Box::new(StructuredAppender::new(DataFormat::Toml)))
			.register("text", || Box::new(TextAppender));
		registry
	}

	/// The appenders named by the `appenders` option.
	pub fn appenders(&self, names: &[String]) -> ScfResult<Vec<Box<dyn Appender>>> {
		self.build_all(names).map_err(ScfError::UnknownAppender)
	}
}
