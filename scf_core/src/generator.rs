use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use globset::Glob;
use ignore::WalkBuilder;
use serde_json::Map;
use serde_json::Value;

use crate::AppenderRegistry;
use crate::Context;
use crate::GenerationUnit;
use crate::MANIFEST_FILE_CANDIDATES;
use crate::Manifest;
use crate::MergeInput;
use crate::Options;
use crate::OptionsResolver;
use crate::Parameters;
use crate::PathLocks;
use crate::Processor;
use crate::ProcessorRegistry;
use crate::RegionIdentity;
use crate::RegionSyntax;
use crate::ScfError;
use crate::ScfResult;
use crate::TemplateSource;
use crate::combine_contents;
use crate::fs::is_temp_file;
use crate::pipeline::has_template_syntax;
use crate::read_optional;
use crate::run_pipeline;
use crate::select_appender;
use crate::strip_directives;
use crate::write_atomic;

/// Settings shared by every application run through a [`Generator`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
	/// Process files one at a time, in order.
	pub debug: bool,
	/// Upper bound on worker threads per unit. `0` uses the available
	/// parallelism.
	pub workers: usize,
	/// Option overrides applied on top of the built-in defaults.
	pub overrides: Map<String, Value>,
}

/// One application of a unit to a target tree.
#[derive(Debug, Clone)]
pub struct ApplyRequest {
	pub unit: GenerationUnit,
	pub parameters: Parameters,
	/// Root of the tree receiving the generated files. The manifest lives
	/// here.
	pub target_root: PathBuf,
	/// Highest precedence option overrides.
	pub runtime_overrides: Map<String, Value>,
}

impl ApplyRequest {
	pub fn new(unit: GenerationUnit, target_root: impl Into<PathBuf>) -> Self {
		Self {
			unit,
			parameters: Parameters::new(),
			target_root: target_root.into(),
			runtime_overrides: Map::new(),
		}
	}

	#[must_use]
	pub fn with_parameters(mut self, parameters: Parameters) -> Self {
		self.parameters = parameters;
		self
	}

	#[must_use]
	pub fn with_runtime_overrides(mut self, overrides: Map<String, Value>) -> Self {
		self.runtime_overrides = overrides;
		self
	}
}

/// The stage a file reached before it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
	Load,
	ResolveOptions,
	Process,
	Merge,
	Persist,
}

impl Display for FileStage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Load => write!(f, "load"),
			Self::ResolveOptions => write!(f, "resolve options"),
			Self::Process => write!(f, "process"),
			Self::Merge => write!(f, "merge"),
			Self::Persist => write!(f, "persist"),
		}
	}
}

/// The result of merging into one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
	pub path: PathBuf,
	/// `false` when the merge produced no change or no write.
	pub written: bool,
}

#[derive(Debug)]
#[allow(variant_size_differences)]
pub enum FileState {
	Done { targets: Vec<TargetOutcome> },
	Failed { stage: FileStage, error: ScfError },
	/// Not started, or its destination not merged, because another file of
	/// the unit failed first.
	Skipped,
}

#[derive(Debug)]
pub struct FileOutcome {
	/// Source file path relative to the partial's content root.
	pub source: PathBuf,
	pub state: FileState,
}

impl FileOutcome {
	pub fn is_done(&self) -> bool {
		matches!(self.state, FileState::Done { .. })
	}
}

/// Outcome of [`Generator::apply`].
#[derive(Debug)]
pub struct UnitReport {
	pub unit: GenerationUnit,
	/// One entry per source file of the partial, in path order.
	pub files: Vec<FileOutcome>,
	/// Whether a new record was added to the manifest.
	pub recorded: bool,
	/// Whether an identical record was already present.
	pub reapplied: bool,
}

impl UnitReport {
	/// Returns `true` when every file completed.
	pub fn is_ok(&self) -> bool {
		self.files.iter().all(FileOutcome::is_done)
	}

	/// Failed files with the stage they failed in.
	pub fn failures(&self) -> impl Iterator<Item = (&Path, FileStage, &ScfError)> {
		self.files.iter().filter_map(|file| {
			match &file.state {
				FileState::Failed { stage, error } => Some((file.source.as_path(), *stage, error)),
				_ => None,
			}
		})
	}

	/// Every destination written during this application, once each and in
	/// path order.
	pub fn written(&self) -> impl Iterator<Item = &Path> {
		self.files
			.iter()
			.filter_map(|file| {
				match &file.state {
					FileState::Done { targets } => Some(targets),
					_ => None,
				}
			})
			.flatten()
			.filter(|target| target.written)
			.map(|target| target.path.as_path())
			.collect::<BTreeSet<_>>()
			.into_iter()
	}
}

/// A source file rendered and ready to merge.
struct PreparedFile {
	context: Context,
	content: String,
	targets: Vec<PathBuf>,
}

/// A destination with the source files merging into it, in source order.
struct Destination<'a> {
	path: PathBuf,
	contributors: Vec<(usize, &'a PreparedFile)>,
}

/// Shared per unit state for processing its files.
struct UnitJob<'a> {
	request: &'a ApplyRequest,
	content_root: PathBuf,
	folder_options: Options,
	span: tracing::Span,
}

type StageResult<T> = Result<T, (FileStage, ScfError)>;

fn at<T>(stage: FileStage, result: ScfResult<T>) -> StageResult<T> {
	result.map_err(|error| (stage, error))
}

/// Applies generation units to target trees.
///
/// A generator is `Send + Sync` and may apply several units concurrently.
/// Destinations shared between units are serialized through one
/// [`PathLocks`] table.
pub struct Generator {
	source: Arc<dyn TemplateSource>,
	processors: ProcessorRegistry,
	appenders: AppenderRegistry,
	locks: Arc<PathLocks>,
	config: GeneratorConfig,
}

impl std::fmt::Debug for Generator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Generator")
			.field("processors", &self.processors)
			.field("appenders", &self.appenders)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl Generator {
	pub fn new(source: impl TemplateSource + 'static) -> Self {
		Self::from_arc(Arc::new(source))
	}

	pub fn from_arc(source: Arc<dyn TemplateSource>) -> Self {
		Self {
			source,
			processors: ProcessorRegistry::with_builtin_processors(),
			appenders: AppenderRegistry::with_builtin_appenders(),
			locks: Arc::new(PathLocks::new()),
			config: GeneratorConfig::default(),
		}
	}

	#[must_use]
	pub fn with_config(mut self, config: GeneratorConfig) -> Self {
		self.config = config;
		self
	}

	/// Share a lock table with other generators writing the same trees.
	#[must_use]
	pub fn with_locks(mut self, locks: Arc<PathLocks>) -> Self {
		self.locks = locks;
		self
	}

	pub fn config(&self) -> &GeneratorConfig {
		&self.config
	}

	/// Registry used to resolve the `processors` option. Register custom
	/// processors here.
	pub fn processors_mut(&mut self) -> &mut ProcessorRegistry {
		&mut self.processors
	}

	/// Registry used to resolve the `appenders` option.
	pub fn appenders_mut(&mut self) -> &mut AppenderRegistry {
		&mut self.appenders
	}

	/// Apply a unit to its target tree.
	///
	/// Manifest corruption and template source failures abort before any
	/// file is written. File level failures are collected in the report and
	/// prevent the manifest record; files already written stay written.
	pub fn apply(&self, request: &ApplyRequest) -> ScfResult<UnitReport> {
		let span = tracing::info_span!("apply", unit = %request.unit);
		let _entered = span.enter();

		Manifest::load(&request.target_root)?;

		let unit = &request.unit;
		let template = self.source.get_template(&unit.template, &unit.version)?;
		let partial = self
			.source
			.get_partial(&unit.partial, &unit.template, &unit.version)?;

		let mut overrides = self.config.overrides.clone();
		for (key, value) in template.options.iter().chain(&partial.config.options) {
			overrides.insert(key.clone(), value.clone());
		}

		let resolver = OptionsResolver::new(&overrides)?;
		let folder_options = resolver.folder_options(&request.target_root)?;
		let sources = collect_files(&partial.content_root).map_err(|e| {
			ScfError::TemplateSource {
				key: unit.to_string(),
				reason: e.to_string(),
			}
		})?;

		let job = UnitJob {
			request,
			content_root: partial.content_root,
			folder_options,
			span: span.clone(),
		};

		let files = self.run_unit(&job, sources);

		let mut report = UnitReport {
			unit: unit.clone(),
			files,
			recorded: false,
			reapplied: false,
		};

		if report.is_ok() {
			report.recorded = Manifest::record(
				&request.target_root,
				unit,
				&request.parameters,
				&self.locks,
			)?;
			report.reapplied = !report.recorded;
			tracing::info!(
				files = report.files.len(),
				written = report.written().count(),
				reapplied = report.reapplied,
				"applied unit"
			);
		} else {
			tracing::warn!(
				failed = report.failures().count(),
				"unit failed, manifest record withheld"
			);
		}

		Ok(report)
	}

	fn worker_count(&self, files: usize) -> usize {
		if self.config.debug {
			return 1;
		}

		let limit = if self.config.workers == 0 {
			std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
		} else {
			self.config.workers
		};

		limit.min(files)
	}

	/// Prepare every source file, then merge once per destination. Source
	/// files sharing a destination contribute a single region, their content
	/// joined in source order.
	fn run_unit(&self, job: &UnitJob<'_>, sources: Vec<PathBuf>) -> Vec<FileOutcome> {
		let prepared = self.run_jobs(
			&job.span,
			&sources,
			|source| self.prepare_file(job, source),
			Result::is_err,
		);

		let mut states = Vec::with_capacity(sources.len());
		let mut ready = Vec::with_capacity(sources.len());
		for result in prepared {
			match result {
				Some(Ok(file)) => {
					states.push(None);
					ready.push(Some(file));
				}
				Some(Err((stage, error))) => {
					states.push(Some(FileState::Failed { stage, error }));
					ready.push(None);
				}
				None => {
					states.push(Some(FileState::Skipped));
					ready.push(None);
				}
			}
		}

		let destinations = group_destinations(&ready);
		let mut merged = self.run_jobs(
			&job.span,
			&destinations,
			|destination| self.merge_group(job.request, destination),
			Result::is_err,
		);
		let positions = destinations
			.iter()
			.enumerate()
			.map(|(index, destination)| (destination.path.as_path(), index))
			.collect::<HashMap<_, _>>();

		sources
			.into_iter()
			.zip(states)
			.zip(&ready)
			.map(|((source, state), file)| {
				let state = match (state, file) {
					(Some(state), _) => state,
					(None, Some(file)) => file_state(file, &positions, &mut merged),
					(None, None) => FileState::Skipped,
				};

				FileOutcome { source, state }
			})
			.collect()
	}

	/// Run `job` over `items` on the worker pool, or in order when `debug` is
	/// set. Once a job fails, items not yet started come back as `None`.
	fn run_jobs<T, R>(
		&self,
		span: &tracing::Span,
		items: &[T],
		job: impl Fn(&T) -> R + Sync,
		is_failure: impl Fn(&R) -> bool + Sync,
	) -> Vec<Option<R>>
	where
		T: Sync,
		R: Send,
	{
		let workers = self.worker_count(items.len());
		if workers <= 1 {
			let mut failed = false;
			return items
				.iter()
				.map(|item| {
					if failed {
						return None;
					}

					let result = job(item);
					failed = is_failure(&result);
					Some(result)
				})
				.collect();
		}

		let next = &AtomicUsize::new(0);
		let failed = &AtomicBool::new(false);
		let job = &job;
		let is_failure = &is_failure;

		let mut indexed = std::thread::scope(|scope| {
			let handles = (0..workers)
				.map(|_| {
					scope.spawn(move || {
						let _entered = span.enter();
						let mut results = vec![];

						loop {
							let index = next.fetch_add(1, Ordering::SeqCst);
							let Some(item) = items.get(index) else {
								break;
							};

							if failed.load(Ordering::SeqCst) {
								results.push((index, None));
								continue;
							}

							let result = job(item);
							if is_failure(&result) {
								failed.store(true, Ordering::SeqCst);
							}
							results.push((index, Some(result)));
						}

						results
					})
				})
				.collect::<Vec<_>>();

			handles
				.into_iter()
				.flat_map(|handle| {
					handle
						.join()
						.unwrap_or_else(|payload| std::panic::resume_unwind(payload))
				})
				.collect::<Vec<_>>()
		});

		indexed.sort_by_key(|(index, _)| *index);
		indexed.into_iter().map(|(_, result)| result).collect()
	}

	fn prepare_file(&self, job: &UnitJob<'_>, source: &Path) -> StageResult<PreparedFile> {
		let span = tracing::debug_span!(parent: &job.span, "file", source = %source.display());
		let prepared = self.prepare_file_stages(job, source, &span);

		if let Err((stage, error)) = &prepared {
			span.in_scope(|| {
				tracing::warn!(%stage, %error, "file failed");
			});
		}

		prepared
	}

	fn prepare_file_stages(
		&self,
		job: &UnitJob<'_>,
		source: &Path,
		span: &tracing::Span,
	) -> StageResult<PreparedFile> {
		let request = job.request;
		let raw = at(
			FileStage::Load,
			std::fs::read_to_string(job.content_root.join(source)).map_err(ScfError::from),
		)?;

		let (options, body) = at(FileStage::ResolveOptions, {
			OptionsResolver::file_options(&job.folder_options, source, &raw).and_then(|file| {
				let body = strip_directives(&raw, &file.directives);
				OptionsResolver::with_runtime(&file.options, &request.runtime_overrides)
					.map(|options| (options, body))
			})
		})?;

		let (context, content) = at(FileStage::Process, {
			self.processors
				.processors(&options.processors)
				.and_then(|processors| {
					let context = Context {
						unit: request.unit.clone(),
						parameters: request.parameters.clone(),
						target_path: source.to_path_buf(),
						template_root: job.content_root.clone(),
						options: options.clone(),
						scratch: Map::new(),
						span: span.clone(),
					};
					let context = render_target_path(&processors, context)?;
					run_pipeline(&processors, context, &body)
				})
		})?;

		let targets = at(
			FileStage::Process,
			resolve_targets(&request.target_root, &context.target_path, &options),
		)?;

		Ok(PreparedFile {
			context,
			content,
			targets,
		})
	}

	/// Merge the combined content of every source file targeting
	/// `destination`. The first contributor's context supplies the options.
	fn merge_group(
		&self,
		request: &ApplyRequest,
		destination: &Destination<'_>,
	) -> StageResult<TargetOutcome> {
		let Some((_, first)) = destination.contributors.first() else {
			return Ok(TargetOutcome {
				path: destination.path.clone(),
				written: false,
			});
		};

		let contents = destination
			.contributors
			.iter()
			.map(|(_, file)| file.content.as_str())
			.collect::<Vec<_>>();

		self.merge_into(request, &first.context, &contents, destination.path.clone())
	}

	/// Merge `contents` into `target` and persist the result, holding the
	/// target's path lock for the whole read, merge and write.
	fn merge_into(
		&self,
		request: &ApplyRequest,
		context: &Context,
		contents: &[&str],
		target: PathBuf,
	) -> StageResult<TargetOutcome> {
		let key = target.clone();
		self.locks.with_lock(&key, || {
			let destination = at(FileStage::Merge, read_optional(&target))?;
			let merged = at(
				FileStage::Merge,
				self.merge_destination(request, context, contents, &target, destination.as_deref()),
			)?;

			let written = match merged {
				Some(next) if destination.as_deref() != Some(next.as_str()) => {
					at(FileStage::Persist, write_atomic(&target, &next))?;
					true
				}
				_ => false,
			};

			context.span.in_scope(|| {
				tracing::debug!(target = %target.display(), written, "merged destination");
			});

			Ok(TargetOutcome {
				path: target,
				written,
			})
		})
	}

	fn merge_destination(
		&self,
		request: &ApplyRequest,
		context: &Context,
		contents: &[&str],
		target: &Path,
		destination: Option<&str>,
	) -> ScfResult<Option<String>> {
		let options = match destination {
			Some(existing) => {
				let file = OptionsResolver::file_options(&context.options, target, existing)?;
				OptionsResolver::with_runtime(&file.options, &request.runtime_overrides)?
			}
			None => context.options.clone(),
		};

		let format = options.format_for(target);
		let content = combine_contents(&format, contents, &options.array_append_strategy)?;
		let appenders = self.appenders.appenders(&options.appenders)?;
		let appender = select_appender(&appenders, &format)?;
		let syntax = RegionSyntax::new(&options, target);
		let identity = RegionIdentity {
			unit: context.unit.clone(),
			parameters: context.parameters.clone(),
		};

		appender.append(&MergeInput {
			destination,
			content: &content,
			identity: &identity,
			syntax: &syntax,
			options: &options,
		})
	}
}

/// Every destination reached by a prepared file, in order of first
/// appearance.
fn group_destinations(ready: &[Option<PreparedFile>]) -> Vec<Destination<'_>> {
	let mut destinations: Vec<Destination<'_>> = vec![];
	let mut positions: HashMap<&Path, usize> = HashMap::new();

	for (index, file) in ready.iter().enumerate() {
		let Some(file) = file else {
			continue;
		};

		for target in &file.targets {
			let position = *positions.entry(target.as_path()).or_insert_with(|| {
				destinations.push(Destination {
					path: target.clone(),
					contributors: vec![],
				});
				destinations.len() - 1
			});

			let contributors = &mut destinations[position].contributors;
			if contributors.last().is_none_or(|(last, _)| *last != index) {
				contributors.push((index, file));
			}
		}
	}

	destinations
}

/// The state of a prepared file, from the merges of its destinations. The
/// first file reporting a failed destination takes its error.
fn file_state(
	file: &PreparedFile,
	positions: &HashMap<&Path, usize>,
	merged: &mut [Option<StageResult<TargetOutcome>>],
) -> FileState {
	let mut targets = vec![];
	let mut failure = None;
	let mut skipped = false;

	for target in &file.targets {
		let Some(&position) = positions.get(target.as_path()) else {
			continue;
		};

		match &mut merged[position] {
			Some(Ok(outcome)) => targets.push(outcome.clone()),
			Some(Err((stage, error))) => {
				if failure.is_none() {
					let shared = ScfError::SharedTargetFailed(target.display().to_string());
					failure = Some((*stage, std::mem::replace(error, shared)));
				}
			}
			None => skipped = true,
		}
	}

	match failure {
		Some((stage, error)) => {
			file.context.span.in_scope(|| {
				tracing::warn!(%stage, %error, "file failed");
			});
			FileState::Failed { stage, error }
		}
		None if skipped => FileState::Skipped,
		None => {
			file.context.span.in_scope(|| {
				tracing::debug!(targets = targets.len(), "file done");
			});
			FileState::Done { targets }
		}
	}
}

/// Render a templated target path through the pipeline.
fn render_target_path(
	processors: &[Box<dyn Processor>],
	context: Context,
) -> ScfResult<Context> {
	let path = context.target_path.to_string_lossy().into_owned();
	if !has_template_syntax(&path) {
		return Ok(context);
	}

	let (mut context, rendered) = run_pipeline(processors, context, &path)?;
	context.target_path = PathBuf::from(rendered);
	Ok(context)
}

fn is_glob(path: &str) -> bool {
	path.contains(['*', '?', '['])
}

/// Destinations for a rendered target path. Glob patterns expand to every
/// matching existing file under the target root.
fn resolve_targets(target_root: &Path, target: &Path, options: &Options) -> ScfResult<Vec<PathBuf>> {
	let pattern = target.to_string_lossy().replace('\\', "/");
	if !is_glob(&pattern) {
		return Ok(vec![target_root.join(apply_naming(target, options))]);
	}

	let matcher = Glob::new(&pattern)
		.map_err(|e| {
			ScfError::InvalidGlob {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?
		.compile_matcher();

	if !target_root.is_dir() {
		return Ok(vec![]);
	}

	let mut matches = collect_files(target_root)
		.map_err(|e| ScfError::Io(std::io::Error::other(e.to_string())))?
		.into_iter()
		.filter(|relative| !MANIFEST_FILE_CANDIDATES.iter().any(|name| relative == Path::new(name)))
		.filter(|relative| matcher.is_match(relative))
		.map(|relative| target_root.join(relative))
		.collect::<Vec<_>>();
	matches.sort();

	Ok(matches)
}

/// Apply `folderNaming` to directory components and `fileNaming` to the file
/// name.
fn apply_naming(path: &Path, options: &Options) -> PathBuf {
	let components = path.components().collect::<Vec<_>>();
	let last = components.len().saturating_sub(1);

	components
		.iter()
		.enumerate()
		.map(|(index, component)| {
			match component {
				Component::Normal(name) => {
					let name = name.to_string_lossy();
					if index == last {
						options.file_naming.apply_to_file_name(&name)
					} else {
						options.folder_naming.apply(&name)
					}
				}
				other => other.as_os_str().to_string_lossy().into_owned(),
			}
		})
		.collect()
}

/// Every file below `root` as a sorted list of relative paths. Nothing is
/// filtered except `.git` directories and in-flight temporary files.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>, ignore::Error> {
	let mut files = vec![];
	let walker = WalkBuilder::new(root)
		.standard_filters(false)
		.filter_entry(|entry| entry.file_name() != ".git")
		.build();

	for entry in walker {
		let entry = entry?;

		if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
			continue;
		}

		let path = entry.path();
		if is_temp_file(path) {
			continue;
		}

		if let Ok(relative) = path.strip_prefix(root) {
			files.push(relative.to_path_buf());
		}
	}

	files.sort();
	Ok(files)
}
