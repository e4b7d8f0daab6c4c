use std::ops::Range;
use std::path::Path;

use serde_json::Value;

use crate::CommentSyntax;
use crate::GenerationUnit;
use crate::Options;
use crate::Parameters;
use crate::ScfError;
use crate::ScfResult;

/// Comment syntax and markers used to recognise regions in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSyntax {
	pub comment: CommentSyntax,
	pub start_marker: String,
	pub end_marker: String,
}

impl RegionSyntax {
	pub fn new(options: &Options, path: &Path) -> Self {
		Self {
			comment: options.comment_syntax_for(path),
			start_marker: options.start_region_marker.clone(),
			end_marker: options.end_region_marker.clone(),
		}
	}

	pub fn start_line(&self) -> String {
		self.comment.wrap(&self.start_marker)
	}

	pub fn end_line(&self) -> String {
		self.comment.wrap(&self.end_marker)
	}
}

/// The decoded identity header of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionIdentity {
	pub unit: GenerationUnit,
	pub parameters: Parameters,
}

/// A delimited block of previously generated content.
///
/// ```text
/// // @scf-region                   <- start
/// // template: my-template@1.0.0
/// // partial: component
/// // param name: "Button"
///
/// export const Button = 1;          <- content_start
/// // @scf-endregion                <- content_end .. end
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
	/// Byte offset of the start of the start marker line.
	pub start: usize,
	/// Byte offset just past the end marker line, including its newline when
	/// present.
	pub end: usize,
	/// Byte offset where the content begins, after the header and the blank
	/// line which terminates it.
	pub content_start: usize,
	/// Byte offset of the start of the end marker line.
	pub content_end: usize,
	/// `None` for unidentified regions.
	pub identity: Option<RegionIdentity>,
}

impl Region {
	/// Whether `offset` lies within this region, markers included.
	pub fn contains(&self, offset: usize) -> bool {
		self.span().contains(&offset)
	}

	pub fn span(&self) -> Range<usize> {
		self.start..self.end
	}

	pub fn content_span(&self) -> Range<usize> {
		self.content_start..self.content_end
	}

	/// The content between header and end marker.
	pub fn content<'a>(&self, text: &'a str) -> &'a str {
		&text[self.content_span()]
	}

	/// Whether this region was produced by `unit`. Parameters are ignored.
	pub fn matches(&self, unit: &GenerationUnit) -> bool {
		self.identity
			.as_ref()
			.is_some_and(|identity| &identity.unit == unit)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
	Start,
	End,
	Other,
}

/// One line of the scanned text.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
	kind: LineKind,
	/// Offset of the first byte of the line.
	start: usize,
	/// Offset just past the line terminator.
	end: usize,
	text: &'a str,
}

fn tokenize<'a>(text: &'a str, syntax: &RegionSyntax) -> Vec<Line<'a>> {
	let mut lines = vec![];
	let mut offset = 0;

	for raw in text.split_inclusive('\n') {
		let content = raw.trim_end_matches(['\n', '\r']);
		let kind = match syntax.comment.strip(content) {
			Some(comment) if comment == syntax.start_marker => LineKind::Start,
			Some(comment) if comment == syntax.end_marker => LineKind::End,
			_ => LineKind::Other,
		};

		lines.push(Line {
			kind,
			start: offset,
			end: offset + raw.len(),
			text: content,
		});
		offset += raw.len();
	}

	lines
}

/// Find every region in `text`.
///
/// Pairing is textual: a start marker pairs with the first end marker after
/// it. A start marker while a region is open, or a region still open at the
/// end of the text, is a [`ScfError::MalformedRegion`]. An end marker with no
/// open region is ordinary text.
pub fn scan_regions(text: &str, syntax: &RegionSyntax) -> ScfResult<Vec<Region>> {
	let lines = tokenize(text, syntax);
	let mut regions = vec![];
	let mut open: Option<usize> = None;

	for (index, line) in lines.iter().enumerate() {
		match (line.kind, open) {
			(LineKind::Start, Some(start_index)) => {
				return Err(ScfError::MalformedRegion {
					line: start_index + 1,
					reason: format!(
						"found another `{}` on line {} before `{}`",
						syntax.start_marker,
						index + 1,
						syntax.end_marker
					),
				});
			}
			(LineKind::Start, None) => open = Some(index),
			(LineKind::End, Some(start_index)) => {
				regions.push(build_region(&lines, start_index, index, syntax));
				open = None;
			}
			_ => {}
		}
	}

	if let Some(start_index) = open {
		return Err(ScfError::MalformedRegion {
			line: start_index + 1,
			reason: format!("missing `{}`", syntax.end_marker),
		});
	}

	Ok(regions)
}

fn build_region(
	lines: &[Line<'_>],
	start_index: usize,
	end_index: usize,
	syntax: &RegionSyntax,
) -> Region {
	let start_line = &lines[start_index];
	let end_line = &lines[end_index];
	let inner = &lines[start_index + 1..end_index];

	let blank = inner.iter().position(|line| line.text.trim().is_empty());
	let (identity, content_start) = match blank {
		Some(position) => {
			let header = &inner[..position];
			(
				parse_header(header, &syntax.comment),
				inner[position].end,
			)
		}
		None => (None, start_line.end),
	};

	Region {
		start: start_line.start,
		end: end_line.end,
		content_start,
		content_end: end_line.start,
		identity,
	}
}

fn parse_header(header: &[Line<'_>], comment: &CommentSyntax) -> Option<RegionIdentity> {
	let mut template = None;
	let mut partial = None;
	let mut parameters = Parameters::new();

	for line in header {
		let text = comment.strip(line.text)?;

		if let Some(rest) = text.strip_prefix("template:") {
			let (name, version) = rest.trim().rsplit_once('@')?;
			if name.is_empty() || version.is_empty() {
				return None;
			}
			template = Some((name.to_string(), version.to_string()));
		} else if let Some(rest) = text.strip_prefix("partial:") {
			partial = Some(rest.trim().to_string());
		} else if let Some(rest) = text.strip_prefix("param ") {
			let (name, raw) = rest.split_once(':')?;
			let value: Value = serde_json::from_str(raw.trim()).ok()?;
			parameters.insert(name.trim().to_string(), value);
		} else {
			return None;
		}
	}

	let (template, version) = template?;
	let partial = partial.filter(|partial| !partial.is_empty())?;

	Some(RegionIdentity {
		unit: GenerationUnit::new(template, version, partial),
		parameters,
	})
}

/// Byte spans of `regions`, markers included.
pub(crate) fn frozen_spans(regions: &[Region]) -> Vec<Range<usize>> {
	regions.iter().map(Region::span).collect()
}
