use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;

use crate::Position;

/// A parsed template: template text with the palette constructs resolved into
/// typed nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
pub struct Template {
	/// The name the template was loaded under, if any. Used as the `origin`
	/// of the components it declares.
	pub name: Option<String>,
	#[deref]
	#[deref_mut]
	pub nodes: Vec<Node>,
}

impl Template {
	/// All component declarations in the template, in source order, including
	/// those nested inside other constructs.
	pub fn components(&self) -> Vec<&ComponentDeclaration> {
		let mut components = vec![];
		collect_components(&self.nodes, &mut components);
		components
	}

	/// All render invocations in the template, in source order, including those
	/// nested inside other constructs.
	pub fn invocations(&self) -> Vec<&RenderInvocation> {
		let mut invocations = vec![];
		collect_invocations(&self.nodes, &mut invocations);
		invocations
	}
}

fn collect_components<'a>(nodes: &'a [Node], components: &mut Vec<&'a ComponentDeclaration>) {
	for node in nodes {
		match node {
			Node::Text(_) => {}
			Node::Component(declaration) => {
				components.push(declaration);
				collect_components(&declaration.nodes, components);
			}
			Node::Block(block) => collect_components(&block.nodes, components),
			Node::Render(invocation) => {
				for item in &invocation.overrides {
					collect_components(&item.nodes, components);
				}
			}
		}
	}
}

fn collect_invocations<'a>(nodes: &'a [Node], invocations: &mut Vec<&'a RenderInvocation>) {
	for node in nodes {
		match node {
			Node::Text(_) => {}
			Node::Component(declaration) => collect_invocations(&declaration.nodes, invocations),
			Node::Block(block) => collect_invocations(&block.nodes, invocations),
			Node::Render(invocation) => {
				invocations.push(invocation);
				for item in &invocation.overrides {
					collect_invocations(&item.nodes, invocations);
				}
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
	/// Template text, including any non-palette `{{ }}` / `{% %}` syntax.
	Text(TextNode),
	Component(ComponentDeclaration),
	Block(BlockDeclaration),
	Render(RenderInvocation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
	pub content: String,
	pub position: Position,
}

/// `{% palette_component "name" [inline] %}...{% endpalette_component %}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDeclaration {
	pub name: String,
	/// Render the default markup where the component is declared.
	pub inline: bool,
	pub nodes: Vec<Node>,
	pub position: Position,
}

/// `{% palette_block name %}default{% endpalette_block %}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeclaration {
	pub name: String,
	/// The default content.
	pub nodes: Vec<Node>,
	pub position: Position,
}

/// `{% palette_ui component="name" file="..." key=value %}...{% endpalette_ui %}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderInvocation {
	pub component: ArgumentValue,
	/// Template that declares the component. Loaded when the component is not
	/// registered yet.
	pub file: Option<ArgumentValue>,
	/// Keyword context in source order.
	pub context: Vec<KeywordArgument>,
	pub overrides: Vec<OverrideDeclaration>,
	pub position: Position,
}

impl RenderInvocation {
	/// The override for `block`. When a block is overridden more than once the
	/// last override wins.
	pub fn override_for(&self, block: &str) -> Option<&OverrideDeclaration> {
		self.overrides.iter().rev().find(|item| item.name == block)
	}
}

/// `{% palette_override name %}...{% endpalette_override %}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDeclaration {
	pub name: String,
	pub nodes: Vec<Node>,
	pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordArgument {
	pub name: String,
	pub value: ArgumentValue,
}

/// The value of a tag argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ArgumentValue {
	/// A quoted string without template syntax, used as is.
	Literal(String),
	/// A quoted string containing `{{ }}` or `{% %}`, rendered against the
	/// ambient context.
	Template(String),
	/// An unquoted expression such as `page.title` or `5`, evaluated against
	/// the ambient context.
	Expression(String),
}

impl ArgumentValue {
	/// The literal value, if it can be known without a context.
	pub fn as_literal(&self) -> Option<&str> {
		match self {
			Self::Literal(value) => Some(value),
			Self::Template(_) | Self::Expression(_) => None,
		}
	}
}

impl std::fmt::Display for ArgumentValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Literal(value) | Self::Template(value) => write!(f, "{value:?}"),
			Self::Expression(value) => write!(f, "{value}"),
		}
	}
}
