use serde_json::Map;
use serde_json::Value;

use crate::AppendStrategy;
use crate::ArrayAppendStrategy;
use crate::DataFormat;
use crate::MergeInput;
use crate::ScfError;
use crate::ScfResult;
use crate::annotate;
use crate::scan_regions;

/// Merge text content into the destination.
///
/// When exactly one region in the destination carries the unit's identity it
/// is replaced and every byte outside it is preserved. Otherwise the
/// `appendStrategy` decides. Returns `None` when nothing should be written.
pub fn merge_text(input: &MergeInput<'_>) -> ScfResult<Option<String>> {
	let options = input.options;
	let block = if options.annotate {
		annotate(
			input.content,
			input.identity,
			input.syntax,
			options.annotation_template.as_deref(),
		)?
	} else {
		input.content.to_string()
	};

	if let Some(destination) = input.destination {
		let regions = scan_regions(destination, input.syntax)?;
		let matching = regions
			.iter()
			.filter(|region| region.matches(&input.identity.unit))
			.collect::<Vec<_>>();

		if matching.len() > 1 {
			return Err(ScfError::MergeConflict {
				unit: input.identity.unit.to_string(),
				count: matching.len(),
			});
		}

		if let Some(region) = matching.first() {
			let (span, mut replacement) = if options.annotate {
				(region.span(), block)
			} else {
				let mut content = input.content.to_string();
				if !content.ends_with('\n') {
					content.push('\n');
				}
				(region.content_span(), content)
			};

			if options.annotate && !destination[..span.end].ends_with('\n') {
				replacement.truncate(replacement.trim_end_matches('\n').len());
			}

			let mut output = String::with_capacity(destination.len() + replacement.len());
			output.push_str(&destination[..span.start]);
			output.push_str(&replacement);
			output.push_str(&destination[span.end..]);

			return Ok(Some(output));
		}
	}

	Ok(apply_append_strategy(
		options.append_strategy,
		input.destination,
		&block,
	))
}

/// Combine `block` with the destination according to `strategy`.
pub fn apply_append_strategy(
	strategy: AppendStrategy,
	destination: Option<&str>,
	block: &str,
) -> Option<String> {
	match (strategy, destination) {
		(AppendStrategy::Replace, _) => Some(block.to_string()),
		(AppendStrategy::AppendIfExists, None) => None,
		(AppendStrategy::Ignore, Some(existing)) if !existing.trim().is_empty() => None,
		(_, Some(existing)) => Some(concat_block(existing, block)),
		(_, None) => Some(block.to_string()),
	}
}

fn concat_block(existing: &str, block: &str) -> String {
	let mut output = String::with_capacity(existing.len() + block.len() + 1);
	output.push_str(existing);
	if !existing.is_empty() && !existing.ends_with('\n') {
		output.push('\n');
	}
	output.push_str(block);
	output
}

/// Merge a structured document into the destination.
///
/// "Append" here means a structural merge: objects merge key by key with the
/// source winning and arrays follow the `arrayAppendStrategy`.
pub fn merge_structured(format: DataFormat, input: &MergeInput<'_>) -> ScfResult<Option<String>> {
	let options = input.options;
	let source = format.parse(input.content)?.unwrap_or(Value::Null);
	let target = match input.destination {
		Some(destination) => format.parse(destination)?,
		None => None,
	};

	let merged = match (options.append_strategy, input.destination, target) {
		(AppendStrategy::Replace, ..) => source,
		(AppendStrategy::AppendIfExists, None, _) => return Ok(None),
		(AppendStrategy::Ignore, _, Some(_)) => return Ok(None),
		(_, _, Some(target)) => merge_values(target, source, &options.array_append_strategy),
		(_, _, None) => source,
	};

	if merged.is_null() {
		return Ok(None);
	}

	format.serialize(&merged).map(Some)
}

/// Combine the output of several source files bound for one destination,
/// in source order. Structured formats merge document by document with
/// later files winning; anything else is joined line by line.
pub fn combine_contents(
	format: &str,
	contents: &[&str],
	arrays: &ArrayAppendStrategy,
) -> ScfResult<String> {
	if let [single] = contents {
		return Ok((*single).to_string());
	}

	let Some(data) = DataFormat::from_name(format) else {
		return Ok(contents
			.iter()
			.copied()
			.filter(|content| !content.is_empty())
			.collect::<Vec<_>>()
			.join("\n"));
	};

	let mut combined: Option<Value> = None;
	for content in contents {
		let Some(value) = data.parse(content)? else {
			continue;
		};
		combined = Some(match combined {
			Some(existing) => merge_values(existing, value, arrays),
			None => value,
		});
	}

	match combined {
		Some(value) => data.serialize(&value),
		None => Ok(String::new()),
	}
}

/// Deep merge `source` into `target`. Object keys keep the target's order and
/// new keys are appended in source order. Any other mismatch, `null`
/// included, is won by the source.
pub fn merge_values(target: Value, source: Value, arrays: &ArrayAppendStrategy) -> Value {
	match (target, source) {
		(Value::Object(target), Value::Object(source)) => {
			Value::Object(merge_objects(target, source, arrays))
		}
		(Value::Array(target), Value::Array(source)) => {
			Value::Array(merge_arrays(target, source, arrays))
		}
		(_, source) => source,
	}
}

fn merge_objects(
	mut target: Map<String, Value>,
	source: Map<String, Value>,
	arrays: &ArrayAppendStrategy,
) -> Map<String, Value> {
	for (key, value) in source {
		match target.get_mut(&key) {
			Some(existing) => {
				let current = std::mem::take(existing);
				*existing = merge_values(current, value, arrays);
			}
			None => {
				target.insert(key, value);
			}
		}
	}

	target
}

/// Merge two arrays according to `strategy`.
pub fn merge_arrays(
	target: Vec<Value>,
	source: Vec<Value>,
	strategy: &ArrayAppendStrategy,
) -> Vec<Value> {
	match strategy {
		ArrayAppendStrategy::Replace => source,
		ArrayAppendStrategy::Ignore => {
			if target.is_empty() {
				source
			} else {
				target
			}
		}
		ArrayAppendStrategy::Concat => {
			let mut merged = target;
			merged.extend(source);
			merged
		}
		ArrayAppendStrategy::Combine => {
			let mut merged = Vec::with_capacity(target.len().max(source.len()));
			let mut source = source.into_iter();

			for item in target {
				match source.next() {
					Some(incoming) => merged.push(merge_values(item, incoming, strategy)),
					None => merged.push(item),
				}
			}

			merged.extend(source);
			merged
		}
		ArrayAppendStrategy::Key(field) => {
			let mut merged = target;

			for incoming in source {
				let position = incoming.get(field).and_then(|key| {
					merged
						.iter()
						.position(|item| item.get(field) == Some(key))
				});

				match position {
					Some(index) => merged[index] = incoming,
					None => merged.push(incoming),
				}
			}

			merged
		}
	}
}
