use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::UNIX_EPOCH;

use crate::ScfResult;

/// Marker embedded in the names of in-flight temporary files.
const TEMP_FILE_MARKER: &str = ".scf-tmp-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Read a file as UTF-8, returning `None` when it does not exist.
pub fn read_optional(path: &Path) -> ScfResult<Option<String>> {
	match std::fs::read_to_string(path) {
		Ok(content) => Ok(Some(content)),
		Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
		Err(error) => Err(error.into()),
	}
}

/// Write `content` to `path` through a temporary sibling file and a rename,
/// creating parent directories as needed. Readers never observe a partially
/// written file.
pub fn write_atomic(path: &Path, content: &str) -> ScfResult<()> {
	if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)?;
	}

	let file_name = path
		.file_name()
		.map_or_else(|| "file".to_string(), |name| name.to_string_lossy().into_owned());
	let temp_path = path.with_file_name(format!(
		".{file_name}{TEMP_FILE_MARKER}{}-{}-{}",
		std::process::id(),
		std::time::SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |duration| duration.as_nanos()),
		TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
	));

	std::fs::write(&temp_path, content)?;

	if let Err(error) = std::fs::rename(&temp_path, path) {
		let _ = std::fs::remove_file(&temp_path);
		return Err(error.into());
	}

	Ok(())
}

pub(crate) fn is_temp_file(path: &Path) -> bool {
	path.file_name()
		.is_some_and(|name| name.to_string_lossy().contains(TEMP_FILE_MARKER))
}

/// Mutual exclusion keyed by canonical absolute path.
///
/// Two spellings of the same file (relative and absolute, or through a
/// symlinked directory) share one lock.
#[derive(Debug, Default)]
pub struct PathLocks {
	locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Run `f` while holding the lock for `path`. The lock is released when
	/// `f` returns, including on error.
	pub fn with_lock<R>(&self, path: &Path, f: impl FnOnce() -> R) -> R {
		let key = canonical_key(path);
		let lock = {
			let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
			Arc::clone(locks.entry(key).or_default())
		};

		let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
		f()
	}
}

/// Canonicalize the deepest existing ancestor of `path` and append the
/// remaining components, so files which do not exist yet still get a stable
/// key.
fn canonical_key(path: &Path) -> PathBuf {
	let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
	let mut existing = absolute.as_path();
	let mut remainder = vec![];

	loop {
		if let Ok(canonical) = existing.canonicalize() {
			let mut key = canonical;
			for component in remainder.iter().rev() {
				key.push(component);
			}
			return key;
		}

		match (existing.parent(), existing.components().next_back()) {
			(Some(parent), Some(Component::Normal(name))) => {
				remainder.push(name.to_os_string());
				existing = parent;
			}
			_ => return absolute,
		}
	}
}
