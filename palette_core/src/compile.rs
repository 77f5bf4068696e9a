use std::collections::hash_map::DefaultHasher;
use std::fmt::Write;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use crate::ArgumentValue;
use crate::Node;

/// Renders the palette node at an index of the unit's call table.
pub(crate) const UI_FUNCTION: &str = "__palette_ui";
/// Resolves the block at an index of the unit's call table.
pub(crate) const BLOCK_FUNCTION: &str = "__palette_block";
/// Context key holding the frame of the unit being rendered.
pub(crate) const FRAME_KEY: &str = "__palette_frame";
/// Prefix shared by every variable the lowering introduces.
pub(crate) const RESERVED_PREFIX: &str = "__palette";

/// A node list lowered into a single minijinja template.
///
/// Text is copied verbatim so host control flow (`{% for %}`, `{% if %}`)
/// can wrap palette tags. Every block and invocation becomes a call to
/// [`BLOCK_FUNCTION`] or [`UI_FUNCTION`] with its index in `calls`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Unit {
	/// Name the compiled template is cached under.
	pub key: String,
	pub source: String,
	pub calls: Vec<Call>,
}

impl Unit {
	/// Whether the source must go through minijinja at all.
	pub fn is_static(&self) -> bool {
		self.calls.is_empty()
			&& !(self.source.contains("{{") || self.source.contains("{%") || self.source.contains("{#"))
	}
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Call {
	Block(String),
	Render(RenderCall),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RenderCall {
	/// The component argument as written, for error messages.
	pub component: ArgumentValue,
	/// `(block name, body)` in source order.
	pub overrides: Vec<(String, Arc<Unit>)>,
}

/// Lower `nodes` into a [`Unit`].
pub(crate) fn lower(nodes: &[Node]) -> Arc<Unit> {
	let mut lowering = Lowering::default();
	lowering.lower_nodes(nodes, false);

	let mut hasher = DefaultHasher::new();
	lowering.source.hash(&mut hasher);

	Arc::new(Unit {
		key: format!("palette-{:016x}-{}", hasher.finish(), lowering.source.len()),
		source: lowering.source,
		calls: lowering.calls,
	})
}

#[derive(Default)]
struct Lowering {
	source: String,
	calls: Vec<Call>,
}

impl Lowering {
	/// In `defaults` mode blocks render their default content directly, as
	/// they do in an `inline` declaration.
	fn lower_nodes(&mut self, nodes: &[Node], defaults: bool) {
		for node in nodes {
			match node {
				Node::Text(text) => self.source.push_str(&text.content),
				Node::Component(declaration) if declaration.inline => {
					self.lower_nodes(&declaration.nodes, true);
				}
				Node::Component(_) => {}
				Node::Block(block) if defaults => self.lower_nodes(&block.nodes, true),
				Node::Block(block) => {
					let index = self.calls.len();
					self.calls.push(Call::Block(block.name.clone()));

					// The default renders in place so it sees loop and `set`
					// variables, then the call decides whether it is used.
					let _ = write!(self.source, "{{% set {RESERVED_PREFIX}_super_{index} %}}");
					self.lower_nodes(&block.nodes, false);
					let _ = write!(
						self.source,
						"{{% endset %}}{{{{ {BLOCK_FUNCTION}({index}, {RESERVED_PREFIX}_super_{index}) }}}}"
					);
				}
				Node::Render(invocation) => {
					let index = self.calls.len();
					self.calls.push(Call::Render(RenderCall {
						component: invocation.component.clone(),
						overrides: invocation
							.overrides
							.iter()
							.map(|item| (item.name.clone(), lower(&item.nodes)))
							.collect(),
					}));

					let mut arguments = 0;
					let component = self.argument(index, &mut arguments, &invocation.component);
					let file = match &invocation.file {
						Some(file) => self.argument(index, &mut arguments, file),
						None => "none".to_string(),
					};
					let mut context = vec![];
					for argument in &invocation.context {
						let value = self.argument(index, &mut arguments, &argument.value);
						context.push(format!("{}: {value}", quote(&argument.name)));
					}

					let _ = write!(
						self.source,
						"{{{{ {UI_FUNCTION}({index}, {component}, {file}, {{{}}}) }}}}",
						context.join(", ")
					);
				}
			}
		}
	}

	/// A minijinja expression for an argument value. Template values are
	/// captured with `{% set %}` right before the call, which marks them safe.
	fn argument(&mut self, index: usize, counter: &mut usize, value: &ArgumentValue) -> String {
		match value {
			ArgumentValue::Literal(literal) => quote(literal),
			ArgumentValue::Expression(expression) => format!("({expression})"),
			ArgumentValue::Template(source) => {
				let name = format!("{RESERVED_PREFIX}_arg_{index}_{counter}");
				*counter += 1;
				let _ = write!(self.source, "{{% set {name} %}}{source}{{% endset %}}");
				name
			}
		}
	}
}

/// A string literal in minijinja syntax. JSON escapes are a subset of the
/// escapes minijinja understands.
fn quote(value: &str) -> String {
	serde_json::Value::from(value).to_string()
}
