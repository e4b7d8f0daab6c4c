use predicates::prelude::*;
use rstest::rstest;
use scf_core::AnyEmptyResult;

mod common;

use common::scf_cmd;
use common::write;

#[test]
fn regions_lists_identities_and_lines() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(
		&tmp.path().join("lib.rs"),
		concat!(
			"fn user() {}\n",
			"// @scf-region\n",
			"// template: react@1.0.0\n",
			"// partial: component\n",
			"// param name: \"Button\"\n",
			"\n",
			"fn generated() {}\n",
			"// @scf-endregion\n",
			"// @scf-region\n",
			"fn unknown() {}\n",
			"// @scf-endregion\n",
		),
	);

	scf_cmd()
		.args(["regions", "lib.rs"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicate::str::contains(
			"    2  react@1.0.0:component  {\"name\":\"Button\"}",
		))
		.stdout(predicate::str::contains("    9  (unidentified)"));

	Ok(())
}

#[test]
fn regions_reports_malformed_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("lib.rs"), "// @scf-region\nfn open() {}\n");

	scf_cmd()
		.args(["regions", "lib.rs"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicate::str::contains("scf::malformed_region"));

	Ok(())
}

#[rstest]
#[case::defaults(None, &[], "\"appendStrategy\": \"append\"")]
#[case::directive(Some("# @scf-option {\"appendStrategy\": \"ignore\"}\n"), &[], "\"appendStrategy\": \"ignore\"")]
#[case::runtime(
	Some("# @scf-option {\"appendStrategy\": \"ignore\"}\n"),
	&["--option", "appendStrategy=replace"],
	"\"appendStrategy\": \"replace\""
)]
#[case::folder(None, &["--option", "arrayAppendStrategy=key<id>"], "\"arrayAppendStrategy\": \"key<id>\"")]
fn options_prints_effective_options(
	#[case] content: Option<&str>,
	#[case] extra: &[&str],
	#[case] expected: &str,
) -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let mut cmd = scf_cmd();
	cmd.arg("options");

	if let Some(content) = content {
		write(&tmp.path().join("config.yml"), content);
		cmd.arg("config.yml");
	}

	cmd.args(extra)
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicate::str::contains(expected));

	Ok(())
}

#[test]
fn options_uses_manifest_folder_options() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(
		&tmp.path().join(".scf.json"),
		r#"{"template": {"name": "react", "version": "1.0.0", "options": {"fileNaming": "kebab"}}}"#,
	);

	scf_cmd()
		.arg("options")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicate::str::contains("\"fileNaming\": \"kebab\""));

	Ok(())
}
