use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::GenerationUnit;
use crate::Parameters;
use crate::PathLocks;
use crate::ScfError;
use crate::ScfResult;
use crate::read_optional;
use crate::write_atomic;

/// Manifest file names, checked in order. The first that exists wins and new
/// manifests are written to the first candidate.
pub const MANIFEST_FILE_CANDIDATES: [&str; 3] = ["scf.json", ".scf.json", ".config/scf.json"];

/// Persisted record kept at the root of every generated tree.
///
/// ```json
/// {
///   "template": { "name": "react", "version": "1.0.0", "options": { "fileNaming": "kebab" } },
///   "partials": [
///     { "path": "component", "template": "react", "version": "1.0.0", "parameters": { "name": "Button" } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub template: Option<ManifestTemplate>,
	#[serde(default)]
	pub partials: Vec<AppliedRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTemplate {
	pub name: String,
	pub version: String,
	/// Folder level option overrides for this tree.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<Map<String, Value>>,
}

/// One successful application of a unit. Bookkeeping only, never consulted
/// when merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRecord {
	/// The partial name.
	pub path: String,
	pub template: String,
	pub version: String,
	#[serde(default)]
	pub parameters: Parameters,
}

impl AppliedRecord {
	pub fn new(unit: &GenerationUnit, parameters: &Parameters) -> Self {
		Self {
			path: unit.partial.clone(),
			template: unit.template.clone(),
			version: unit.version.clone(),
			parameters: parameters.clone(),
		}
	}
}

impl Manifest {
	/// Path of the first existing manifest candidate under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		MANIFEST_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the manifest under `root`. Returns `None` if there is none.
	pub fn load(root: &Path) -> ScfResult<Option<Self>> {
		let Some(path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let Some(content) = read_optional(&path)? else {
			return Ok(None);
		};

		let manifest = serde_json::from_str(&content).map_err(|e| {
			ScfError::ManifestCorruption {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})?;

		Ok(Some(manifest))
	}

	/// Folder level option overrides, empty when absent.
	pub fn folder_options(&self) -> Map<String, Value> {
		self.template
			.as_ref()
			.and_then(|template| template.options.clone())
			.unwrap_or_default()
	}

	pub fn contains(&self, unit: &GenerationUnit, parameters: &Parameters) -> bool {
		let record = AppliedRecord::new(unit, parameters);
		self.partials.contains(&record)
	}

	/// Append a record for `unit` to the manifest under `root`, creating the
	/// manifest when missing. The read-modify-write runs under the manifest's
	/// path lock. Returns `false` if an identical record was already present.
	pub fn record(
		root: &Path,
		unit: &GenerationUnit,
		parameters: &Parameters,
		locks: &PathLocks,
	) -> ScfResult<bool> {
		let path = Self::resolve_path(root).unwrap_or_else(|| root.join(MANIFEST_FILE_CANDIDATES[0]));

		locks.with_lock(&path, || {
			let mut manifest = Self::load(root)?.unwrap_or_default();
			if manifest.contains(unit, parameters) {
				return Ok(false);
			}

			if manifest.template.is_none() {
				manifest.template = Some(ManifestTemplate {
					name: unit.template.clone(),
					version: unit.version.clone(),
					options: None,
				});
			}

			manifest.partials.push(AppliedRecord::new(unit, parameters));

			let mut payload = serde_json::to_string_pretty(&manifest).map_err(|e| {
				ScfError::ManifestCorruption {
					path: path.display().to_string(),
					reason: e.to_string(),
				}
			})?;
			payload.push('\n');
			write_atomic(&path, &payload)?;

			Ok(true)
		})
	}
}
