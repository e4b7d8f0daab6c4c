use minijinja::context;

use crate::RegionIdentity;
use crate::RegionSyntax;
use crate::ScfResult;
use crate::render_template;

/// Annotation template producing the canonical region shape. Custom
/// templates receive the same variables: `start`, `end`, `open`, `close`,
/// `template`, `version`, `partial`, `parameters` (a list of `name` and JSON
/// encoded `value` pairs) and `content`.
pub const DEFAULT_ANNOTATION_TEMPLATE: &str = concat!(
	"{{ start }}\n",
	"{{ open }}template: {{ template }}@{{ version }}{{ close }}\n",
	"{{ open }}partial: {{ partial }}{{ close }}\n",
	"{% for param in parameters %}{{ open }}param {{ param.name }}: {{ param.value }}{{ close }}\n{% endfor %}",
	"\n",
	"{{ content }}\n",
	"{{ end }}\n",
);

/// Wrap `content` in region markers and an identity header.
///
/// The result always ends with a newline.
pub fn annotate(
	content: &str,
	identity: &RegionIdentity,
	syntax: &RegionSyntax,
	template: Option<&str>,
) -> ScfResult<String> {
	let parameters = identity
		.parameters
		.iter()
		.map(|(name, value)| {
			let encoded = serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
			context! { name => name, value => encoded }
		})
		.collect::<Vec<_>>();

	let variables = context! {
		start => syntax.start_line(),
		end => syntax.end_line(),
		open => syntax.comment.open(),
		close => syntax.comment.close(),
		template => identity.unit.template,
		version => identity.unit.version,
		partial => identity.unit.partial,
		parameters => parameters,
		content => content.trim_end_matches(['\n', '\r']),
	};

	let mut rendered = render_template(template.unwrap_or(DEFAULT_ANNOTATION_TEMPLATE), &variables)?;
	if !rendered.ends_with('\n') {
		rendered.push('\n');
	}

	Ok(rendered)
}
