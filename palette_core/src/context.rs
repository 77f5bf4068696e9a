use std::collections::BTreeMap;

use minijinja::Value;
use serde::Serialize;

use crate::PaletteError;
use crate::PaletteResult;

/// Variable bindings for a render, organized as a stack of layers.
///
/// The bottom layer holds the ambient page context. Each render invocation
/// pushes a layer with its keyword context and pops it afterwards, so the
/// most locally supplied value wins on conflicts.
#[derive(Debug, Clone)]
pub struct Context {
	layers: Vec<BTreeMap<String, Value>>,
}

impl Default for Context {
	fn default() -> Self {
		Self::new()
	}
}

impl Context {
	pub fn new() -> Self {
		Self {
			layers: vec![BTreeMap::new()],
		}
	}

	/// Build a context from any value that serializes to a map, e.g. a struct
	/// or a `serde_json::Value::Object`.
	pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> PaletteResult<Self> {
		let json = serde_json::to_value(value).map_err(|e| PaletteError::TemplateRender(e.to_string()))?;
		let serde_json::Value::Object(map) = json else {
			return Err(PaletteError::ContextNotMap {
				kind: json_kind(&json).to_string(),
			});
		};

		let mut context = Self::new();
		for (key, value) in map {
			context.insert(key, Value::from_serialize(&value));
		}

		Ok(context)
	}

	/// Set a variable in the innermost layer.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		if let Some(layer) = self.layers.last_mut() {
			layer.insert(key.into(), value.into());
		}
	}

	/// Builder form of [`Context::insert`].
	#[must_use]
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	/// Add every top-level entry of `other` to the innermost layer.
	pub fn extend(&mut self, other: &Context) {
		for (key, value) in other.flatten_map() {
			self.insert(key, value);
		}
	}

	/// Look up a variable, searching from the innermost layer outwards.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.layers.iter().rev().find_map(|layer| layer.get(key))
	}

	pub fn push(&mut self, layer: BTreeMap<String, Value>) {
		self.layers.push(layer);
	}

	/// Remove the innermost layer. The ambient layer is never removed.
	pub fn pop(&mut self) -> Option<BTreeMap<String, Value>> {
		if self.layers.len() > 1 {
			self.layers.pop()
		} else {
			None
		}
	}

	pub fn depth(&self) -> usize {
		self.layers.len()
	}

	pub(crate) fn flatten_map(&self) -> BTreeMap<String, Value> {
		let mut merged = BTreeMap::new();
		for layer in &self.layers {
			for (key, value) in layer {
				merged.insert(key.clone(), value.clone());
			}
		}
		merged
	}

	/// Merge all layers into a single map value for the template engine.
	pub fn flatten(&self) -> Value {
		Value::from(self.flatten_map())
	}
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "boolean",
		serde_json::Value::Number(_) => "number",
		serde_json::Value::String(_) => "string",
		serde_json::Value::Array(_) => "array",
		serde_json::Value::Object(_) => "object",
	}
}
