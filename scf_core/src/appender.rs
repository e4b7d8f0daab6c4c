use std::fmt::Display;

use serde_json::Value;

use crate::Options;
use crate::RegionIdentity;
use crate::RegionSyntax;
use crate::ScfError;
use crate::ScfResult;
use crate::merge_structured;
use crate::merge_text;

/// Everything an appender needs to combine fresh content with a destination.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
	/// Current destination content, `None` when the file does not exist.
	pub destination: Option<&'a str>,
	/// Final pipeline output.
	pub content: &'a str,
	pub identity: &'a RegionIdentity,
	pub syntax: &'a RegionSyntax,
	pub options: &'a Options,
}

/// Merge strategy for one kind of content.
pub trait Appender: Send + Sync {
	fn name(&self) -> &str;

	/// Whether this appender handles targets of the given format.
	fn accepts(&self, format: &str) -> bool;

	/// The new destination content, or `None` when nothing should be written.
	fn append(&self, input: &MergeInput<'_>) -> ScfResult<Option<String>>;
}

/// Region aware merging of plain text. Accepts every format.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextAppender;

impl Appender for TextAppender {
	fn name(&self) -> &'static str {
		"text"
	}

	fn accepts(&self, _format: &str) -> bool {
		true
	}

	fn append(&self, input: &MergeInput<'_>) -> ScfResult<Option<String>> {
		merge_text(input)
	}
}

/// A structured document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DataFormat {
	Json,
	Yaml,
	Toml,
}

impl DataFormat {
	/// Detect a format from a format name or file extension.
	pub fn from_name(name: &str) -> Option<Self> {
		match name.to_ascii_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			"toml" => Some(Self::Toml),
			_ => None,
		}
	}

	/// Parse a document. Blank input yields `None`.
	pub fn parse(self, content: &str) -> ScfResult<Option<Value>> {
		if content.trim().is_empty() {
			return Ok(None);
		}

		let value = match self {
			Self::Json => serde_json::from_str(content).map_err(|e| self.error(e))?,
			Self::Yaml => serde_yaml_ng::from_str(content).map_err(|e| self.error(e))?,
			Self::Toml => {
				let table: toml::Table = toml::from_str(content).map_err(|e| self.error(e))?;
				toml_to_json(toml::Value::Table(table))
			}
		};

		Ok(Some(value))
	}

	/// Serialize a document, always ending with a newline.
	pub fn serialize(self, value: &Value) -> ScfResult<String> {
		let mut output = match self {
			Self::Json => serde_json::to_string_pretty(value).map_err(|e| self.error(e))?,
			Self::Yaml => serde_yaml_ng::to_string(value).map_err(|e| self.error(e))?,
			Self::Toml => {
				let toml::Value::Table(table) = json_to_toml(value)? else {
					return Err(self.error("the top level of a TOML document must be a table"));
				};
				toml::to_string_pretty(&table).map_err(|e| self.error(e))?
			}
		};

		if !output.ends_with('\n') {
			output.push('\n');
		}

		Ok(output)
	}

	fn error(self, reason: impl ToString) -> ScfError {
		ScfError::StructuredData {
			format: self.to_string(),
			reason: reason.to_string(),
		}
	}
}

impl Display for DataFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Json => write!(f, "json"),
			Self::Yaml => write!(f, "yaml"),
			Self::Toml => write!(f, "toml"),
		}
	}
}

/// Structural merging of JSON, YAML or TOML documents.
#[derive(Debug, Clone, Copy)]
pub struct StructuredAppender {
	format: DataFormat,
}

impl StructuredAppender {
	pub fn new(format: DataFormat) -> Self {
		Self { format }
	}
}

impl Appender for StructuredAppender {
	fn name(&self) -> &'static str {
		match self.format {
			DataFormat::Json => "json",
			DataFormat::Yaml => "yaml",
			DataFormat::Toml => "toml",
		}
	}

	fn accepts(&self, format: &str) -> bool {
		DataFormat::from_name(format) == Some(self.format)
	}

	fn append(&self, input: &MergeInput<'_>) -> ScfResult<Option<String>> {
		merge_structured(self.format, input)
	}
}

/// The first appender accepting `format`.
pub fn select_appender<'a>(
	appenders: &'a [Box<dyn Appender>],
	format: &str,
) -> ScfResult<&'a dyn Appender> {
	appenders
		.iter()
		.find(|appender| appender.accepts(format))
		.map(|appender| &**appender)
		.ok_or_else(|| ScfError::UnsupportedFormat(format.to_string()))
}

/// Object key carrying a TOML datetime through the JSON based merge, so
/// datetimes are written back unquoted.
const TOML_DATETIME_KEY: &str = "$__scf_toml_datetime";

fn toml_to_json(value: toml::Value) -> Value {
	match value {
		toml::Value::String(s) => Value::String(s),
		toml::Value::Integer(i) => Value::from(i),
		toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
		toml::Value::Boolean(b) => Value::Bool(b),
		toml::Value::Datetime(dt) => {
			let mut wrapper = serde_json::Map::new();
			wrapper.insert(TOML_DATETIME_KEY.to_string(), Value::String(dt.to_string()));
			Value::Object(wrapper)
		}
		toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
		toml::Value::Table(table) => {
			Value::Object(
				table
					.into_iter()
					.map(|(key, value)| (key, toml_to_json(value)))
					.collect(),
			)
		}
	}
}

fn json_to_toml(value: &Value) -> ScfResult<toml::Value> {
	let converted = match value {
		Value::Null => {
			return Err(ScfError::StructuredData {
				format: DataFormat::Toml.to_string(),
				reason: "TOML has no representation for null".to_string(),
			});
		}
		Value::Bool(b) => toml::Value::Boolean(*b),
		Value::Number(number) => {
			match number.as_i64() {
				Some(i) => toml::Value::Integer(i),
				None => toml::Value::Float(number.as_f64().unwrap_or_default()),
			}
		}
		Value::String(s) => toml::Value::String(s.clone()),
		Value::Array(items) => {
			toml::Value::Array(items.iter().map(json_to_toml).collect::<ScfResult<_>>()?)
		}
		Value::Object(map) => {
			if let Some(datetime) = toml_datetime(map) {
				return Ok(toml::Value::Datetime(datetime));
			}

			let mut table = toml::Table::new();
			for (key, item) in map {
				table.insert(key.clone(), json_to_toml(item)?);
			}
			toml::Value::Table(table)
		}
	};

	Ok(converted)
}

fn toml_datetime(map: &serde_json::Map<String, Value>) -> Option<toml::value::Datetime> {
	if map.len() != 1 {
		return None;
	}

	map.get(TOML_DATETIME_KEY)?.as_str()?.parse().ok()
}
