use std::collections::HashSet;

use crate::ArgumentValue;
use crate::BlockDeclaration;
use crate::ComponentDeclaration;
use crate::KeywordArgument;
use crate::Node;
use crate::OverrideDeclaration;
use crate::PaletteError;
use crate::PaletteResult;
use crate::RenderInvocation;
use crate::Template;
use crate::TextNode;
use crate::lexer::tokenize;
use crate::tokens::Segment;
use crate::tokens::Tag;
use crate::tokens::TagKind;
use crate::tokens::TagToken;

/// Parse template source into a [`Template`].
pub fn parse(source: impl AsRef<str>) -> PaletteResult<Template> {
	let segments = tokenize(source.as_ref())?;
	let nodes = TreeBuilder::new(segments).build()?;

	Ok(Template { name: None, nodes })
}

/// Parse template source that was loaded under `name`.
pub fn parse_named(name: impl Into<String>, source: impl AsRef<str>) -> PaletteResult<Template> {
	let mut template = parse(source)?;
	template.name = Some(name.into());
	Ok(template)
}

/// The component whose blocks are currently being collected.
struct BlockScope {
	component: String,
	names: HashSet<String>,
}

/// Turns the flat segment stream into a node tree, matching opening and
/// closing tags.
struct TreeBuilder {
	segments: std::vec::IntoIter<Segment>,
	scopes: Vec<BlockScope>,
}

impl TreeBuilder {
	fn new(segments: Vec<Segment>) -> Self {
		Self {
			segments: segments.into_iter(),
			scopes: vec![],
		}
	}

	fn build(mut self) -> PaletteResult<Vec<Node>> {
		self.parse_nodes(None, None)
	}

	/// Parse nodes until the closer of `opener` (or the end of input at the
	/// root).
	fn parse_nodes(&mut self, opener: Option<&Tag>, name: Option<&str>) -> PaletteResult<Vec<Node>> {
		let mut nodes = vec![];

		while let Some(segment) = self.segments.next() {
			match segment {
				Segment::Text { content, position } => {
					nodes.push(Node::Text(TextNode { content, position }));
				}
				Segment::Tag(tag) if tag.kind.is_closer() => {
					check_closer(opener, name, &tag)?;
					return Ok(nodes);
				}
				Segment::Tag(tag) => nodes.push(self.parse_construct(tag)?),
			}
		}

		match opener {
			Some(opener) => Err(unclosed(opener)),
			None => Ok(nodes),
		}
	}

	fn parse_construct(&mut self, tag: Tag) -> PaletteResult<Node> {
		match tag.kind {
			TagKind::Component => self.parse_component(tag),
			TagKind::Block => self.parse_block(tag),
			TagKind::Render => self.parse_render(tag),
			TagKind::Override => {
				Err(PaletteError::OverrideOutsideInvocation {
					name: single_name(&tag)?,
					line: tag.position.line,
					column: tag.position.column,
				})
			}
			TagKind::EndComponent | TagKind::EndBlock | TagKind::EndRender | TagKind::EndOverride => {
				Err(unexpected_closer(&tag))
			}
		}
	}

	fn parse_component(&mut self, tag: Tag) -> PaletteResult<Node> {
		let (name, inline) = match tag.tokens.as_slice() {
			[token] => (token_name(token, &tag)?, false),
			[token, TagToken::Word(flag)] if flag == "inline" => (token_name(token, &tag)?, true),
			[] => return Err(missing_argument(&tag, "name")),
			[_, other, ..] => {
				return Err(syntax(
					&tag,
					format!("unexpected `{other}` in `{}`", tag.kind),
				));
			}
		};

		self.scopes.push(BlockScope {
			component: name.clone(),
			names: HashSet::new(),
		});
		let nodes = self.parse_nodes(Some(&tag), Some(&name));
		self.scopes.pop();

		Ok(Node::Component(ComponentDeclaration {
			name,
			inline,
			nodes: nodes?,
			position: tag.position,
		}))
	}

	fn parse_block(&mut self, tag: Tag) -> PaletteResult<Node> {
		let name = single_name(&tag)?;

		let Some(scope) = self.scopes.last_mut() else {
			return Err(PaletteError::BlockOutsideComponent {
				name,
				line: tag.position.line,
				column: tag.position.column,
			});
		};

		if !scope.names.insert(name.clone()) {
			return Err(PaletteError::DuplicateBlock {
				component: scope.component.clone(),
				block: name,
			});
		}

		let nodes = self.parse_nodes(Some(&tag), Some(&name))?;

		Ok(Node::Block(BlockDeclaration {
			name,
			nodes,
			position: tag.position,
		}))
	}

	fn parse_render(&mut self, tag: Tag) -> PaletteResult<Node> {
		let mut invocation = parse_render_arguments(&tag)?;

		// Only overrides are meaningful inside the body. Loose text is
		// whitespace between overrides in practice and is dropped.
		while let Some(segment) = self.segments.next() {
			let Segment::Tag(inner) = segment else {
				continue;
			};

			match inner.kind {
				TagKind::Override => {
					let name = single_name(&inner)?;
					let nodes = self.parse_nodes(Some(&inner), Some(&name))?;
					invocation.overrides.push(OverrideDeclaration {
						name,
						nodes,
						position: inner.position,
					});
				}
				TagKind::EndRender => {
					check_closer(Some(&tag), None, &inner)?;
					return Ok(Node::Render(invocation));
				}
				kind if kind.is_closer() => return Err(unexpected_closer(&inner)),
				kind => {
					return Err(syntax(
						&inner,
						format!("`{kind}` is not allowed directly inside `palette_ui`"),
					));
				}
			}
		}

		Err(unclosed(&tag))
	}
}

fn parse_render_arguments(tag: &Tag) -> PaletteResult<RenderInvocation> {
	let mut component = None;
	let mut file = None;
	let mut context = vec![];
	let mut after_with = false;
	let mut tokens = tag.tokens.iter().peekable();

	while let Some(token) = tokens.next() {
		let TagToken::Word(key) = token else {
			return Err(syntax(
				tag,
				format!("expected a keyword argument (key=value), got `{token}`"),
			));
		};

		if key == "with" && !matches!(tokens.peek(), Some(TagToken::Equals)) {
			after_with = true;
			continue;
		}

		if tokens.next() != Some(&TagToken::Equals) {
			return Err(syntax(tag, format!("expected `=` after `{key}`")));
		}

		let value = match tokens.next() {
			Some(TagToken::Quoted(value, _)) => classify_quoted(value),
			Some(TagToken::Word(word)) => ArgumentValue::Expression(word.clone()),
			_ => return Err(syntax(tag, format!("expected a value for `{key}`"))),
		};

		match key.as_str() {
			"component" if !after_with => component = Some(value),
			"file" if !after_with => file = Some(value),
			_ => {
				context.push(KeywordArgument {
					name: key.clone(),
					value,
				});
			}
		}
	}

	let Some(component) = component else {
		return Err(missing_argument(tag, "component"));
	};

	Ok(RenderInvocation {
		component,
		file,
		context,
		overrides: vec![],
		position: tag.position,
	})
}

/// A quoted value holding a single `{{ expression }}` keeps the expression's
/// value; other quoted values with template syntax render to a string.
fn classify_quoted(value: &str) -> ArgumentValue {
	let trimmed = value.trim();

	if let Some(expression) = trimmed
		.strip_prefix("{{")
		.and_then(|rest| rest.strip_suffix("}}"))
		.filter(|inner| !inner.contains("{{") && !inner.contains("}}"))
	{
		return ArgumentValue::Expression(expression.trim().to_string());
	}

	if value.contains("{{") || value.contains("{%") {
		return ArgumentValue::Template(value.to_string());
	}

	ArgumentValue::Literal(value.to_string())
}

fn check_closer(opener: Option<&Tag>, name: Option<&str>, closer: &Tag) -> PaletteResult<()> {
	if opener.and_then(|tag| tag.kind.closer()) != Some(closer.kind) {
		return Err(unexpected_closer(closer));
	}

	match closer.tokens.as_slice() {
		[] => Ok(()),
		[token] => {
			let closing = token_name(token, closer)?;
			if Some(closing.as_str()) == name {
				Ok(())
			} else {
				Err(syntax(
					closer,
					format!(
						"`{}` closes `{closing}` but `{}` is open",
						closer.kind,
						name.unwrap_or_default()
					),
				))
			}
		}
		[_, other, ..] => Err(syntax(closer, format!("unexpected `{other}` in `{}`", closer.kind))),
	}
}

fn single_name(tag: &Tag) -> PaletteResult<String> {
	match tag.tokens.as_slice() {
		[token] => token_name(token, tag),
		[] => Err(missing_argument(tag, "name")),
		[_, other, ..] => Err(syntax(tag, format!("unexpected `{other}` in `{}`", tag.kind))),
	}
}

fn token_name(token: &TagToken, tag: &Tag) -> PaletteResult<String> {
	match token {
		TagToken::Word(name) | TagToken::Quoted(name, _) if !name.is_empty() => Ok(name.clone()),
		_ => Err(syntax(tag, format!("expected a name, got `{token}`"))),
	}
}

fn syntax(tag: &Tag, message: String) -> PaletteError {
	PaletteError::Syntax {
		message,
		line: tag.position.line,
		column: tag.position.column,
	}
}

fn missing_argument(tag: &Tag, argument: &str) -> PaletteError {
	PaletteError::MissingArgument {
		tag: tag.kind.to_string(),
		argument: argument.to_string(),
		line: tag.position.line,
		column: tag.position.column,
	}
}

fn unclosed(tag: &Tag) -> PaletteError {
	PaletteError::UnclosedTag {
		tag: tag.kind.to_string(),
		line: tag.position.line,
		column: tag.position.column,
	}
}

fn unexpected_closer(tag: &Tag) -> PaletteError {
	PaletteError::UnexpectedClosingTag {
		tag: tag.kind.to_string(),
		line: tag.position.line,
		column: tag.position.column,
	}
}
