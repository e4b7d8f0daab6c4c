use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The identity of one template partial being applied: the template name, its
/// version and the partial within it.
///
/// Regions written into destination files carry this identity in their
/// header, which is what lets a later run find and replace exactly the block
/// it produced before.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationUnit {
	/// Name of the template, e.g. `react-component`.
	pub template: String,
	/// Version of the template, e.g. `1.2.0`.
	pub version: String,
	/// Name of the partial inside the template, e.g. `component`.
	pub partial: String,
}

impl GenerationUnit {
	pub fn new(
		template: impl Into<String>,
		version: impl Into<String>,
		partial: impl Into<String>,
	) -> Self {
		Self {
			template: template.into(),
			version: version.into(),
			partial: partial.into(),
		}
	}
}

impl FromStr for GenerationUnit {
	type Err = String;

	/// Parse the `template@version:partial` form produced by `Display`.
	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let invalid = || format!("expected `template@version:partial`, got `{value}`");
		let (identity, partial) = value.rsplit_once(':').ok_or_else(invalid)?;
		let (template, version) = identity.rsplit_once('@').ok_or_else(invalid)?;

		if template.is_empty() || version.is_empty() || partial.is_empty() {
			return Err(invalid());
		}

		Ok(Self::new(template, version, partial))
	}
}

impl Display for GenerationUnit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{}:{}", self.template, self.version, self.partial)
	}
}

/// Caller supplied parameters for one application of a [`GenerationUnit`].
///
/// Parameters are kept ordered by name so that annotation headers and
/// manifest records are deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct Parameters(
	#[deref]
	#[deref_mut]
	BTreeMap<String, Value>,
);

impl Parameters {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder style insert.
	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.0.insert(name.into(), value.into());
		self
	}
}

impl FromIterator<(String, Value)> for Parameters {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}
