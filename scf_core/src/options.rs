use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Default marker opening a generated region.
pub const DEFAULT_START_REGION_MARKER: &str = "@scf-region";
/// Default marker closing a generated region.
pub const DEFAULT_END_REGION_MARKER: &str = "@scf-endregion";
/// Default marker introducing an inline option directive.
pub const DEFAULT_OPTION_MARKER: &str = "@scf-option";

/// Resolved configuration for generating a single file.
///
/// Options are an immutable value. Every resolution step produces a new
/// instance through [`Options::layer`] rather than mutating a shared default.
///
/// ```json
/// {
///   "appendStrategy": "appendIfExists",
///   "arrayAppendStrategy": "key<id>",
///   "processors": ["template"],
///   "commentSyntax": "<!-- -->"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
	/// Comment syntax used for region markers, e.g. `//`, `#` or `<!-- -->`.
	/// When absent it is inferred from the target's extension.
	pub comment_syntax: Option<String>,
	pub start_region_marker: String,
	pub end_region_marker: String,
	/// Marker that introduces an inline option directive.
	pub option_marker: String,
	/// Wrap generated content in region markers and an identity header.
	pub annotate: bool,
	/// Custom minijinja template used to annotate generated content.
	pub annotation_template: Option<String>,
	pub append_strategy: AppendStrategy,
	pub array_append_strategy: ArrayAppendStrategy,
	/// Names of the content pipeline stages, in order.
	pub processors: Vec<String>,
	/// Names of the appenders considered for a target, in order of
	/// preference.
	pub appenders: Vec<String>,
	/// Declared target format. Overrides detection by file extension.
	pub format: Option<String>,
	pub folder_naming: NamingConvention,
	pub file_naming: NamingConvention,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			comment_syntax: None,
			start_region_marker: DEFAULT_START_REGION_MARKER.to_string(),
			end_region_marker: DEFAULT_END_REGION_MARKER.to_string(),
			option_marker: DEFAULT_OPTION_MARKER.to_string(),
			annotate: true,
			annotation_template: None,
			append_strategy: AppendStrategy::default(),
			array_append_strategy: ArrayAppendStrategy::default(),
			processors: vec!["template".to_string()],
			appenders: ["json", "yaml", "toml", "text"]
				.iter()
				.map(ToString::to_string)
				.collect(),
			format: None,
			folder_naming: NamingConvention::default(),
			file_naming: NamingConvention::default(),
		}
	}
}

impl Options {
	/// Layer `overrides` on top of these options and return the result.
	///
	/// Keys overwrite shallowly, so list valued options such as `processors`
	/// are replaced wholesale and never concatenated. Unknown keys are
	/// ignored.
	pub fn layer(&self, overrides: &Map<String, Value>) -> Result<Self, serde_json::Error> {
		if overrides.is_empty() {
			return Ok(self.clone());
		}

		let mut value = serde_json::to_value(self)?;
		if let Value::Object(map) = &mut value {
			for (key, override_value) in overrides {
				map.insert(key.clone(), override_value.clone());
			}
		}

		serde_json::from_value(value)
	}

	/// The comment syntax for the given target path.
	pub fn comment_syntax_for(&self, path: &Path) -> CommentSyntax {
		match &self.comment_syntax {
			Some(syntax) => CommentSyntax::parse(syntax),
			None => CommentSyntax::for_path(path),
		}
	}

	/// The content format of the given target: the declared `format` if
	/// present, otherwise the lowercased file extension (`text` when there is
	/// none).
	pub fn format_for(&self, path: &Path) -> String {
		if let Some(format) = &self.format {
			return format.trim().to_ascii_lowercase();
		}

		path.extension()
			.and_then(|ext| ext.to_str())
			.map_or_else(|| "text".to_string(), str::to_ascii_lowercase)
	}
}

/// How freshly rendered content is combined with a destination when no
/// previously generated region for the same unit exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppendStrategy {
	/// Append to the destination, creating it when missing.
	#[default]
	Append,
	/// Append to the destination, doing nothing when it is missing.
	AppendIfExists,
	/// Discard the destination content.
	Replace,
	/// Leave a non-empty destination alone.
	Ignore,
}

impl Display for AppendStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Append => write!(f, "append"),
			Self::AppendIfExists => write!(f, "appendIfExists"),
			Self::Replace => write!(f, "replace"),
			Self::Ignore => write!(f, "ignore"),
		}
	}
}

/// How arrays inside structured documents are merged.
///
/// Serialized as a string: `combine`, `concat`, `replace`, `ignore` or
/// `key<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArrayAppendStrategy {
	/// Merge items pairwise by position.
	#[default]
	Combine,
	/// Target items followed by source items.
	Concat,
	/// Source array only.
	Replace,
	/// Target array when non-empty, else the source array.
	Ignore,
	/// Match items by the value of the named field. A source item replaces
	/// the target item sharing its key and unmatched source items are
	/// appended.
	Key(String),
}

impl FromStr for ArrayAppendStrategy {
	type Err = String;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.trim() {
			"combine" => Ok(Self::Combine),
			"concat" => Ok(Self::Concat),
			"replace" => Ok(Self::Replace),
			"ignore" => Ok(Self::Ignore),
			other => {
				other
					.strip_prefix("key<")
					.and_then(|rest| rest.strip_suffix('>'))
					.map(str::trim)
					.filter(|field| !field.is_empty())
					.map(|field| Self::Key(field.to_string()))
					.ok_or_else(|| {
						format!(
							"unknown array append strategy `{other}` (expected combine, concat, \
							 replace, ignore or key<name>)"
						)
					})
			}
		}
	}
}

impl TryFrom<String> for ArrayAppendStrategy {
	type Error = String;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<ArrayAppendStrategy> for String {
	fn from(value: ArrayAppendStrategy) -> Self {
		value.to_string()
	}
}

impl Display for ArrayAppendStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Combine => write!(f, "combine"),
			Self::Concat => write!(f, "concat"),
			Self::Replace => write!(f, "replace"),
			Self::Ignore => write!(f, "ignore"),
			Self::Key(field) => write!(f, "key<{field}>"),
		}
	}
}

/// Naming convention applied to rendered target paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
	/// Leave names untouched.
	#[default]
	None,
	/// `my-component`
	Kebab,
	/// `my_component`
	Snake,
	/// `myComponent`
	Camel,
	/// `MyComponent`
	Pascal,
}

impl NamingConvention {
	/// Convert a single name to this convention.
	pub fn apply(self, name: &str) -> String {
		if self == Self::None {
			return name.to_string();
		}

		let words = split_words(name);
		if words.is_empty() {
			return name.to_string();
		}

		match self {
			Self::None => name.to_string(),
			Self::Kebab => join_lowercase(&words, "-"),
			Self::Snake => join_lowercase(&words, "_"),
			Self::Camel => {
				words
					.iter()
					.enumerate()
					.map(|(index, word)| {
						if index == 0 {
							word.to_lowercase()
						} else {
							capitalize(word)
						}
					})
					.collect()
			}
			Self::Pascal => words.iter().map(|word| capitalize(word)).collect(),
		}
	}

	/// Convert a file name, keeping everything from the first `.` onwards.
	/// Dotfiles are left untouched.
	pub fn apply_to_file_name(self, file_name: &str) -> String {
		match file_name.find('.') {
			Some(0) => file_name.to_string(),
			Some(index) => format!("{}{}", self.apply(&file_name[..index]), &file_name[index..]),
			None => self.apply(file_name),
		}
	}
}

fn split_words(input: &str) -> Vec<String> {
	let mut words = Vec::new();
	let mut current = String::new();
	let mut previous: Option<char> = None;

	for ch in input.chars() {
		if !ch.is_alphanumeric() {
			if !current.is_empty() {
				words.push(std::mem::take(&mut current));
			}
			previous = None;
			continue;
		}

		if let Some(prev) = previous {
			if ch.is_uppercase() && (prev.is_lowercase() || prev.is_ascii_digit()) {
				words.push(std::mem::take(&mut current));
			}
		}

		current.push(ch);
		previous = Some(ch);
	}

	if !current.is_empty() {
		words.push(current);
	}

	words
}

fn join_lowercase(words: &[String], separator: &str) -> String {
	words
		.iter()
		.map(|word| word.to_lowercase())
		.collect::<Vec<_>>()
		.join(separator)
}

fn capitalize(word: &str) -> String {
	let mut chars = word.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
		None => String::new(),
	}
}

/// Single-line comment syntax: a prefix and an optional suffix for languages
/// whose comments must be closed on the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSyntax {
	pub prefix: String,
	pub suffix: Option<String>,
}

impl CommentSyntax {
	/// Parse `"<prefix>"` or `"<prefix> <suffix>"`, e.g. `"//"` or
	/// `"<!-- -->"`.
	pub fn parse(value: &str) -> Self {
		let mut parts = value.split_whitespace();
		let prefix = parts.next().unwrap_or("#").to_string();
		let suffix = parts.next().map(ToString::to_string);

		Self { prefix, suffix }
	}

	/// Infer the comment syntax from a file extension.
	pub fn for_path(path: &Path) -> Self {
		let extension = path
			.extension()
			.and_then(|ext| ext.to_str())
			.unwrap_or("")
			.to_ascii_lowercase();

		let syntax = match extension.as_str() {
			"rs" | "ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "mjs" | "cjs" | "go" | "java"
			| "kt" | "kts" | "swift" | "c" | "cc" | "cpp" | "h" | "hpp" | "cs" | "dart" | "php"
			| "scala" | "scss" | "less" | "zig" | "proto" | "groovy" | "gradle" => "//",
			"md" | "mdx" | "markdown" | "html" | "htm" | "xml" | "svg" | "vue" | "svelte" => {
				"<!-- -->"
			}
			"css" => "/* */",
			"sql" | "lua" | "hs" | "elm" => "--",
			"erl" | "hrl" | "tex" => "%",
			"bat" | "cmd" => "::",
			_ => "#",
		};

		Self::parse(syntax)
	}

	/// Wrap text as a single comment line (without the trailing newline).
	pub fn wrap(&self, text: &str) -> String {
		match &self.suffix {
			Some(suffix) => format!("{} {text} {suffix}", self.prefix),
			None => format!("{} {text}", self.prefix),
		}
	}

	/// The text of a comment line with the comment syntax removed and
	/// surrounding whitespace trimmed. `None` if the line is not a comment in
	/// this syntax.
	pub fn strip<'a>(&self, line: &'a str) -> Option<&'a str> {
		let rest = line.trim().strip_prefix(self.prefix.as_str())?;
		let rest = match &self.suffix {
			Some(suffix) => rest.trim_end().strip_suffix(suffix.as_str())?,
			None => rest,
		};

		Some(rest.trim())
	}

	/// The text placed before commented content, including the separating
	/// space.
	pub fn open(&self) -> String {
		format!("{} ", self.prefix)
	}

	/// The text placed after commented content, including the separating
	/// space. Empty for prefix-only syntaxes.
	pub fn close(&self) -> String {
		self.suffix
			.as_ref()
			.map_or_else(String::new, |suffix| format!(" {suffix}"))
	}
}
