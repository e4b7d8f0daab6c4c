use std::path::Path;
use std::path::PathBuf;

use serde_json::Map;
use serde_json::Value;

use crate::CommentSyntax;
use crate::DirectorySource;
use crate::GenerationUnit;
use crate::Generator;
use crate::GeneratorConfig;
use crate::Options;
use crate::Parameters;
use crate::RegionIdentity;
use crate::RegionSyntax;

pub const TEMPLATE: &str = "react";
pub const VERSION: &str = "1.0.0";
pub const PARTIAL: &str = "component";

pub fn unit() -> GenerationUnit {
	GenerationUnit::new(TEMPLATE, VERSION, PARTIAL)
}

pub fn identity(parameters: Parameters) -> RegionIdentity {
	RegionIdentity {
		unit: unit(),
		parameters,
	}
}

pub fn slash_syntax() -> RegionSyntax {
	RegionSyntax {
		comment: CommentSyntax::parse("//"),
		start_marker: "@scf-region".to_string(),
		end_marker: "@scf-endregion".to_string(),
	}
}

pub fn plain_options() -> Options {
	Options {
		annotate: false,
		..Options::default()
	}
}

pub fn object(value: Value) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		other => panic!("expected an object, got {other}"),
	}
}

pub fn write_file(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

pub fn read_file(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Lay out a partial under `templates` in the directory source format and
/// return its `files/` directory.
pub fn write_partial(
	templates: &Path,
	partial: &str,
	config: Option<&str>,
	files: &[(&str, &str)],
) -> PathBuf {
	let dir = templates
		.join(TEMPLATE)
		.join(VERSION)
		.join("partials")
		.join(partial);
	let content_root = dir.join("files");
	std::fs::create_dir_all(&content_root).unwrap_or_else(|e| panic!("create_dir_all: {e}"));

	if let Some(config) = config {
		write_file(&dir.join("partial.json"), config);
	}

	for (path, content) in files {
		write_file(&content_root.join(path), content);
	}

	content_root
}

pub fn generator(templates: &Path, debug: bool) -> Generator {
	Generator::new(DirectorySource::new(templates)).with_config(GeneratorConfig {
		debug,
		..GeneratorConfig::default()
	})
}
