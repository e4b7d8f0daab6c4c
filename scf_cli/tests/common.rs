#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;

pub fn scf_cmd() -> Command {
	let mut cmd = Command::cargo_bin("scf").unwrap_or_else(|e| panic!("scf binary: {e}"));
	cmd.env("NO_COLOR", "1").env_remove("SCF_LOG");
	cmd
}

pub fn write(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

/// Lay out `react@1.0.0:component` with the given files under
/// `<root>/templates`.
pub fn write_component(root: &Path, files: &[(&str, &str)]) {
	let partial = root.join("templates/react/1.0.0/partials/component");
	for (path, content) in files {
		write(&partial.join("files").join(path), content);
	}
}
