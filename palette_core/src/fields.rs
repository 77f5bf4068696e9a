//! Display helpers that turn a record's fields into name/value pairs, plus the
//! template filters built on them.
//!
//! Records are anything that serializes to a map. Fields keep their declaration
//! order.

use minijinja::Error;
use minijinja::ErrorKind;
use minijinja::Value;
use minijinja::value::ValueKind;
use serde::Serialize;

use crate::PaletteError;
use crate::PaletteResult;
use crate::context::json_kind;

const EMPTY_VALUE_HTML: &str = r#"<span class="text-muted">—</span>"#;
const TRUE_VALUE_HTML: &str =
	r#"<i class="bi bi-check-circle-fill" style="color: #28a745; font-size: 1.2em;"></i>"#;
const FALSE_VALUE_HTML: &str =
	r#"<i class="bi bi-x-circle-fill" style="color: #dc3545; font-size: 1.2em;"></i>"#;

fn to_record<T: Serialize + ?Sized>(
	object: &T,
) -> PaletteResult<Option<serde_json::Map<String, serde_json::Value>>> {
	let value = serde_json::to_value(object).map_err(|e| {
		PaletteError::NotARecord {
			kind: e.to_string(),
		}
	})?;

	match value {
		serde_json::Value::Null => Ok(None),
		serde_json::Value::Object(map) => Ok(Some(map)),
		other => {
			Err(PaletteError::NotARecord {
				kind: json_kind(&other).to_string(),
			})
		}
	}
}

/// Every field of `object` as `(name, value)` pairs in declaration order.
///
/// `None` / `null` yields no fields.
///
/// ```rust
/// use palette_core::admin_fields;
/// use serde_json::json;
///
/// let fields = admin_fields(&json!({ "title": "Hello", "views": 5 })).unwrap();
/// assert_eq!(fields[0], ("title".to_string(), json!("Hello")));
/// assert_eq!(fields[1], ("views".to_string(), json!(5)));
/// ```
pub fn admin_fields<T: Serialize + ?Sized>(
	object: &T,
) -> PaletteResult<Vec<(String, serde_json::Value)>> {
	Ok(to_record(object)?
		.map(|map| map.into_iter().collect())
		.unwrap_or_default())
}

/// The value of a single field. A missing field is
/// [`PaletteError::FieldNotFound`]; a present `null` field is `Ok(Null)`.
pub fn admin_field<T: Serialize + ?Sized>(
	object: &T,
	name: &str,
) -> PaletteResult<serde_json::Value> {
	to_record(object)?
		.and_then(|mut map| map.remove(name))
		.ok_or_else(|| {
			PaletteError::FieldNotFound {
				field: name.to_string(),
			}
		})
}

/// `first_name` becomes `First Name`.
pub fn humanize_name(value: &str) -> String {
	value
		.replace('_', " ")
		.split_whitespace()
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => {
					first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
				}
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Display markup for a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDisplay {
	/// Markup that must not be escaped.
	Html(&'static str),
	Text(String),
}

/// Format a field value for display: empty values become a muted dash,
/// booleans become check / cross icons, everything else its string form.
pub fn format_field_value(value: &serde_json::Value) -> FieldDisplay {
	match value {
		serde_json::Value::Null => FieldDisplay::Html(EMPTY_VALUE_HTML),
		serde_json::Value::String(text) if text.is_empty() => FieldDisplay::Html(EMPTY_VALUE_HTML),
		serde_json::Value::String(text) => FieldDisplay::Text(text.clone()),
		serde_json::Value::Bool(true) => FieldDisplay::Html(TRUE_VALUE_HTML),
		serde_json::Value::Bool(false) => FieldDisplay::Html(FALSE_VALUE_HTML),
		other => FieldDisplay::Text(other.to_string()),
	}
}

/// `{% for name, value in object|admin_fields %}`
pub(crate) fn admin_fields_filter(object: Value) -> Result<Value, Error> {
	match object.kind() {
		ValueKind::Undefined | ValueKind::None => Ok(Value::from(Vec::<Value>::new())),
		ValueKind::Map => {
			let mut pairs = vec![];
			for key in object.try_iter()? {
				let value = object.get_item(&key)?;
				pairs.push(Value::from(vec![key, value]));
			}
			Ok(Value::from(pairs))
		}
		kind => {
			Err(Error::new(
				ErrorKind::InvalidOperation,
				format!("admin_fields expects a record, got {kind}"),
			))
		}
	}
}

/// `{{ object|admin_field("title") }}`
pub(crate) fn admin_field_filter(object: Value, name: String) -> Result<Value, Error> {
	let value = object.get_attr(&name)?;

	if value.is_undefined() {
		return Err(Error::new(
			ErrorKind::InvalidOperation,
			format!("field `{name}` not found"),
		));
	}

	Ok(value)
}

pub(crate) fn humanize_name_filter(value: Value) -> String {
	if value.is_undefined() || value.is_none() {
		return String::new();
	}

	humanize_name(&value.to_string())
}

pub(crate) fn format_field_value_filter(value: Value) -> Value {
	if value.is_undefined() || value.is_none() {
		return Value::from_safe_string(EMPTY_VALUE_HTML.to_string());
	}

	match value.kind() {
		ValueKind::Bool if value.is_true() => Value::from_safe_string(TRUE_VALUE_HTML.to_string()),
		ValueKind::Bool => Value::from_safe_string(FALSE_VALUE_HTML.to_string()),
		ValueKind::String if value.as_str().is_some_and(str::is_empty) => {
			Value::from_safe_string(EMPTY_VALUE_HTML.to_string())
		}
		_ => Value::from(value.to_string()),
	}
}
