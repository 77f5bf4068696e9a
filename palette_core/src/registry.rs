use std::collections::HashMap;
use std::sync::Arc;

use crate::BlockDeclaration;
use crate::ComponentDeclaration;
use crate::Node;
use crate::PaletteError;
use crate::PaletteResult;
use crate::compile::Unit;
use crate::compile::lower;
use crate::parse;

/// A registered component: its outer markup with the block declarations in
/// their structural positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
	pub name: String,
	/// The template the component was declared in.
	pub origin: Option<String>,
	pub nodes: Vec<Node>,
	/// `nodes` lowered once for rendering.
	pub(crate) unit: Arc<Unit>,
}

impl ComponentDefinition {
	pub fn from_declaration(declaration: &ComponentDeclaration, origin: Option<&str>) -> Self {
		Self {
			name: declaration.name.clone(),
			origin: origin.map(ToString::to_string),
			nodes: declaration.nodes.clone(),
			unit: lower(&declaration.nodes),
		}
	}

	/// Build a definition from the source of a component body, e.g.
	/// `<div>{% palette_block body %}...{% endpalette_block %}</div>`.
	pub fn parse(name: impl Into<String>, body: &str) -> PaletteResult<Self> {
		let name = name.into();
		let source = format!("{{% palette_component {name:?} %}}{body}{{% endpalette_component %}}");
		let template = parse(source)?;

		let Some(Node::Component(declaration)) = template.nodes.into_iter().next() else {
			return Err(PaletteError::Syntax {
				message: format!("`{name}` is not a valid component body"),
				line: 1,
				column: 1,
			});
		};

		Ok(Self::from_declaration(&declaration, None))
	}

	/// The block declarations in definition order (depth first, so a block
	/// nested in another block's default comes right after its parent).
	pub fn blocks(&self) -> Vec<&BlockDeclaration> {
		let mut blocks = vec![];
		collect_blocks(&self.nodes, &mut blocks);
		blocks
	}

	pub fn block_names(&self) -> Vec<&str> {
		self.blocks()
			.into_iter()
			.map(|block| block.name.as_str())
			.collect()
	}

	pub fn has_block(&self, name: &str) -> bool {
		self.blocks().iter().any(|block| block.name == name)
	}
}

/// Blocks belong to the innermost component, so nested component
/// declarations are not searched. Override bodies of nested invocations are,
/// because their blocks are lexically part of this component.
fn collect_blocks<'a>(nodes: &'a [Node], blocks: &mut Vec<&'a BlockDeclaration>) {
	for node in nodes {
		match node {
			Node::Text(_) | Node::Component(_) => {}
			Node::Block(block) => {
				blocks.push(block);
				collect_blocks(&block.nodes, blocks);
			}
			Node::Render(invocation) => {
				for item in &invocation.overrides {
					collect_blocks(&item.nodes, blocks);
				}
			}
		}
	}
}

/// The store of component definitions for one rendering session or
/// application instance.
///
/// Registering a name that already exists replaces the previous definition.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	components: HashMap<String, Arc<ComponentDefinition>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace a definition, returning the one it replaced.
	pub fn register(&mut self, definition: ComponentDefinition) -> Option<Arc<ComponentDefinition>> {
		let name = definition.name.clone();
		let definition = Arc::new(definition);
		let previous = self.components.insert(name.clone(), definition.clone());

		match &previous {
			Some(previous) if previous.nodes != definition.nodes => {
				tracing::warn!(
					component = %name,
					previous_origin = previous.origin.as_deref().unwrap_or("<inline>"),
					origin = definition.origin.as_deref().unwrap_or("<inline>"),
					"component redeclared with a different body",
				);
			}
			Some(_) => tracing::trace!(component = %name, "component redeclared"),
			None => tracing::debug!(component = %name, "component registered"),
		}

		previous
	}

	/// Look up a definition, failing with
	/// [`PaletteError::ComponentNotDeclared`].
	pub fn lookup(&self, name: &str) -> PaletteResult<Arc<ComponentDefinition>> {
		self.get(name).ok_or_else(|| {
			PaletteError::ComponentNotDeclared {
				name: name.to_string(),
			}
		})
	}

	pub fn get(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
		self.components.get(name).cloned()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.components.contains_key(name)
	}

	/// Registered component names in sorted order.
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	pub fn len(&self) -> usize {
		self.components.len()
	}

	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	pub fn clear(&mut self) {
		self.components.clear();
	}
}
