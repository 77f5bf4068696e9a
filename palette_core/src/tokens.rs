use std::fmt::Display;

use crate::Position;

/// The eight palette tag keywords. Any other `{% ... %}` tag is plain
/// template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
	/// `{% palette_component "name" %}`
	Component,
	/// `{% endpalette_component %}`
	EndComponent,
	/// `{% palette_block name %}`
	Block,
	/// `{% endpalette_block %}`
	EndBlock,
	/// `{% palette_ui component="name" ... %}`
	Render,
	/// `{% endpalette_ui %}`
	EndRender,
	/// `{% palette_override name %}`
	Override,
	/// `{% endpalette_override %}`
	EndOverride,
}

impl TagKind {
	pub fn from_keyword(keyword: &str) -> Option<Self> {
		let kind = match keyword {
			"palette_component" => Self::Component,
			"endpalette_component" => Self::EndComponent,
			"palette_block" => Self::Block,
			"endpalette_block" => Self::EndBlock,
			"palette_ui" => Self::Render,
			"endpalette_ui" => Self::EndRender,
			"palette_override" => Self::Override,
			"endpalette_override" => Self::EndOverride,
			_ => return None,
		};

		Some(kind)
	}

	pub fn keyword(self) -> &'static str {
		match self {
			Self::Component => "palette_component",
			Self::EndComponent => "endpalette_component",
			Self::Block => "palette_block",
			Self::EndBlock => "endpalette_block",
			Self::Render => "palette_ui",
			Self::EndRender => "endpalette_ui",
			Self::Override => "palette_override",
			Self::EndOverride => "endpalette_override",
		}
	}

	/// The closing tag expected for an opening tag.
	pub fn closer(self) -> Option<Self> {
		match self {
			Self::Component => Some(Self::EndComponent),
			Self::Block => Some(Self::EndBlock),
			Self::Render => Some(Self::EndRender),
			Self::Override => Some(Self::EndOverride),
			Self::EndComponent | Self::EndBlock | Self::EndRender | Self::EndOverride => None,
		}
	}

	pub fn is_closer(self) -> bool {
		self.closer().is_none()
	}
}

impl Display for TagKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.keyword())
	}
}

/// A token inside the argument list of a palette tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagToken {
	/// `=`
	Equals,
	/// An unquoted run of characters, e.g. `card`, `page.title`, `5`.
	Word(String),
	/// Quoted string content with escapes resolved, and the quote character.
	Quoted(String, u8),
}

impl Display for TagToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Equals => write!(f, "="),
			Self::Word(word) => write!(f, "{word}"),
			Self::Quoted(value, quote) => {
				let quote = *quote as char;
				write!(f, "{quote}{value}{quote}")
			}
		}
	}
}

/// A single palette tag with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
	pub kind: TagKind,
	pub tokens: Vec<TagToken>,
	/// Position of the opening `{%`.
	pub position: Position,
}

/// The flat output of the lexer: template text interleaved with palette
/// tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Text { content: String, position: Position },
	Tag(Tag),
}
