use std::ops::Range;

use serde_json::Map;
use serde_json::Value;

use crate::ScfError;
use crate::ScfResult;

/// An inline option directive: the option marker followed by a JSON object
/// literal, e.g. `// @scf-option {"appendStrategy": "replace"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
	/// Byte offset of the option marker.
	pub offset: usize,
	/// Byte range of the whole lines occupied by the directive, including the
	/// trailing newline of the last line.
	pub lines: Range<usize>,
	/// The decoded JSON object.
	pub payload: Map<String, Value>,
}

/// Pre-computed line-start offsets for offset to line conversion.
pub(crate) struct LineTable {
	line_starts: Vec<usize>,
}

impl LineTable {
	pub(crate) fn new(content: &str) -> Self {
		let mut line_starts = vec![0];
		for (index, byte) in content.bytes().enumerate() {
			if byte == b'\n' {
				line_starts.push(index + 1);
			}
		}

		Self { line_starts }
	}

	/// The 1-based line containing `offset`.
	pub(crate) fn line_of(&self, offset: usize) -> usize {
		match self.line_starts.binary_search(&offset) {
			Ok(index) => index + 1,
			Err(index) => index,
		}
	}

	/// Byte offset of the start of the line containing `offset`.
	pub(crate) fn line_start(&self, offset: usize) -> usize {
		self.line_starts[self.line_of(offset) - 1]
	}
}

/// Find every directive for `marker` in `text`.
///
/// Markers whose offset falls inside one of the `frozen` ranges (previously
/// generated regions) are skipped, as are markers not followed by `{`. The
/// payload must be a balanced JSON object and may span several lines. Braces inside JSON strings are ignored while
/// balancing.
pub fn scan_directives(
	text: &str,
	marker: &str,
	path: &str,
	frozen: &[Range<usize>],
) -> ScfResult<Vec<Directive>> {
	let mut directives = vec![];
	if marker.is_empty() {
		return Ok(directives);
	}

	let table = LineTable::new(text);
	let mut cursor = 0;

	while let Some(found) = text[cursor..].find(marker) {
		let offset = cursor + found;
		let after_marker = offset + marker.len();
		cursor = after_marker;

		if frozen.iter().any(|range| range.contains(&offset)) {
			continue;
		}

		let line = table.line_of(offset);
		let rest = &text[after_marker..];
		let object_start = after_marker + (rest.len() - rest.trim_start().len());

		// A marker without an object is plain prose.
		if !text[object_start..].starts_with('{') {
			continue;
		}

		let Some(object_end) = find_object_end(text, object_start) else {
			return Err(ScfError::config_parse(
				path,
				format!("line {line}: unbalanced braces in `{marker}` directive"),
			));
		};

		let payload: Map<String, Value> = serde_json::from_str(&text[object_start..object_end])
			.map_err(|e| ScfError::config_parse(path, format!("line {line}: {e}")))?;

		let lines_end = text[object_end..]
			.find('\n')
			.map_or(text.len(), |index| object_end + index + 1);

		directives.push(Directive {
			offset,
			lines: table.line_start(offset)..lines_end,
			payload,
		});
		cursor = object_end;
	}

	Ok(directives)
}

/// Returns the offset just past the `}` closing the object opened at `start`.
fn find_object_end(text: &str, start: usize) -> Option<usize> {
	let mut depth = 0usize;
	let mut in_string = false;
	let mut escaped = false;

	for (index, ch) in text[start..].char_indices() {
		if in_string {
			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == '"' {
				in_string = false;
			}
			continue;
		}

		match ch {
			'"' => in_string = true,
			'{' => depth += 1,
			'}' => {
				depth -= 1;
				if depth == 0 {
					return Some(start + index + 1);
				}
			}
			_ => {}
		}
	}

	None
}

/// Remove the lines occupied by `directives` from `text`.
pub fn strip_directives(text: &str, directives: &[Directive]) -> String {
	if directives.is_empty() {
		return text.to_string();
	}

	let mut output = String::with_capacity(text.len());
	let mut cursor = 0;

	for directive in directives {
		if directive.lines.start < cursor {
			continue;
		}
		output.push_str(&text[cursor..directive.lines.start]);
		cursor = directive.lines.end;
	}

	output.push_str(&text[cursor..]);
	output
}
