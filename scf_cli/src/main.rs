use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use scf_cli::Commands;
use scf_cli::ScfCli;
use scf_cli::into_map;
use scf_core::ApplyRequest;
use scf_core::CachedSource;
use scf_core::DirectorySource;
use scf_core::FileState;
use scf_core::GenerationUnit;
use scf_core::Generator;
use scf_core::GeneratorConfig;
use scf_core::OptionsResolver;
use scf_core::Parameters;
use scf_core::RegionSyntax;
use scf_core::read_optional;
use scf_core::scan_regions;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,dimmed) => {
		if color_enabled() {
			format!("{}", $text.dimmed())
		} else {
			format!("{}", $text)
		}
	};
}

type CliResult = Result<bool, Box<dyn std::error::Error>>;

fn main() {
	let args = ScfCli::parse();

	// Color is off when requested or when stdout is not a terminal.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_logging(args.verbose);

	let result = match &args.command {
		Some(Commands::Apply {
			unit,
			templates,
			params,
			options,
			debug,
			workers,
		}) => {
			run_apply(&args, unit, templates, params, options, *debug, *workers)
		}
		Some(Commands::Regions { file }) => run_regions(&args, file),
		Some(Commands::Options { file, options }) => run_options(&args, file.as_deref(), options),
		None => {
			eprintln!("No subcommand specified. Run `scf --help` for usage.");
			process::exit(1);
		}
	};

	match result {
		Ok(true) => {}
		Ok(false) => process::exit(1),
		Err(e) => {
			match e.downcast::<scf_core::ScfError>() {
				Ok(scf_err) => {
					let report: miette::Report = (*scf_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(2);
		}
	}
}

/// Logs go to stderr. `SCF_LOG` takes an `EnvFilter` directive and wins over
/// `--verbose`.
fn init_logging(verbose: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_env("SCF_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.try_init()
		.ok();
}

fn resolve_root(args: &ScfCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn resolve_in_root(root: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		path.to_path_buf()
	} else {
		root.join(path)
	}
}

fn run_apply(
	args: &ScfCli,
	unit: &GenerationUnit,
	templates: &Path,
	params: &[(String, Value)],
	options: &[(String, Value)],
	debug: bool,
	workers: Option<usize>,
) -> CliResult {
	let root = resolve_root(args);
	let templates = resolve_in_root(&root, templates);
	let generator = Generator::new(CachedSource::new(DirectorySource::new(templates)))
		.with_config(GeneratorConfig {
			debug,
			workers: workers.unwrap_or_default(),
			..GeneratorConfig::default()
		});

	let request = ApplyRequest::new(unit.clone(), &root)
		.with_parameters(params.iter().cloned().collect::<Parameters>())
		.with_runtime_overrides(into_map(options));
	let report = generator.apply(&request)?;

	let mut seen = HashSet::new();
	for file in &report.files {
		match &file.state {
			FileState::Done { targets } => {
				for target in targets.iter().filter(|target| seen.insert(&target.path)) {
					let path = target.path.strip_prefix(&root).unwrap_or(&target.path);
					if target.written {
						println!("  {} {}", colored!("wrote", green), path.display());
					} else if args.verbose {
						println!("  {} {}", colored!("unchanged", dimmed), path.display());
					}
				}
			}
			FileState::Failed { stage, error } => {
				eprintln!(
					"  {} {} during {stage}: {error}",
					colored!("failed", red),
					file.source.display()
				);
			}
			FileState::Skipped => {
				eprintln!(
					"  {} {}",
					colored!("skipped", yellow),
					file.source.display()
				);
			}
		}
	}

	if !report.is_ok() {
		eprintln!(
			"{} {} was not recorded: {} file(s) failed",
			colored!("error:", red),
			report.unit,
			report.failures().count()
		);
		return Ok(false);
	}

	let written = report.written().count();
	if report.reapplied {
		println!(
			"Re-applied {} ({written} file(s) changed)",
			report.unit
		);
	} else {
		println!(
			"{} {} ({written} file(s) written)",
			colored!("Applied", green),
			report.unit
		);
	}

	Ok(true)
}

fn run_regions(args: &ScfCli, file: &Path) -> CliResult {
	let root = resolve_root(args);
	let file = resolve_in_root(&root, file);
	let Some(content) = read_optional(&file)? else {
		return Err(format!("`{}` does not exist", file.display()).into());
	};

	let options = OptionsResolver::default().resolve_content(
		&root,
		Some((file.as_path(), content.as_str())),
		&serde_json::Map::new(),
	)?;
	let syntax = RegionSyntax::new(&options, &file);
	let regions = scan_regions(&content, &syntax)?;

	if regions.is_empty() {
		println!("No regions found in {}", file.display());
		return Ok(true);
	}

	for region in &regions {
		let line = content[..region.start].matches('\n').count() + 1;
		match &region.identity {
			Some(identity) => {
				let parameters = serde_json::to_string(&identity.parameters)?;
				println!("{line:>5}  {}  {parameters}", identity.unit);
			}
			None => println!("{line:>5}  {}", colored!("(unidentified)", dimmed)),
		}
	}

	Ok(true)
}

fn run_options(args: &ScfCli, file: Option<&Path>, options: &[(String, Value)]) -> CliResult {
	let root = resolve_root(args);
	let file = file.map(|file| resolve_in_root(&root, file));
	let resolved =
		OptionsResolver::default().resolve(&root, file.as_deref(), &into_map(options))?;

	println!("{}", serde_json::to_string_pretty(&resolved)?);

	Ok(true)
}
