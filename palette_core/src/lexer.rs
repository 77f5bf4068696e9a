use logos::Logos;
use snailquote::unescape;

use crate::PaletteError;
use crate::PaletteResult;
use crate::Position;
use crate::position::LineIndex;
use crate::tokens::Segment;
use crate::tokens::Tag;
use crate::tokens::TagKind;
use crate::tokens::TagToken;

/// Raw tokens produced by logos for the argument list of a palette tag.
#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum RawToken {
	#[token("=")]
	Equals,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r#"[^ \t\r\n="']+"#)]
	Word,
}

/// The parts of a `{% ... %}` or `{%- ... -%}` tag.
struct RawTag<'a> {
	/// Byte offset of the opening `{`.
	start: usize,
	/// Byte offset just past the closing `}`.
	end: usize,
	/// Tag content with whitespace control markers and padding removed.
	inner: &'a str,
	trim_before: bool,
	trim_after: bool,
}

impl<'a> RawTag<'a> {
	fn keyword(&self) -> &'a str {
		self.inner.split_whitespace().next().unwrap_or_default()
	}

	fn arguments(&self) -> &'a str {
		let keyword = self.keyword();
		self.inner[keyword.len()..].trim_start()
	}
}

/// Walks template source, cutting it into text segments and palette tags.
struct SegmentWalker<'a> {
	source: &'a str,
	lines: LineIndex,
	/// Start of the text not yet emitted.
	text_start: usize,
	/// Where to continue searching for the next tag.
	cursor: usize,
	/// Strip leading whitespace from the next text segment (`-%}`).
	trim_next: bool,
	segments: Vec<Segment>,
}

impl<'a> SegmentWalker<'a> {
	fn new(source: &'a str) -> Self {
		Self {
			source,
			lines: LineIndex::new(source),
			text_start: 0,
			cursor: 0,
			trim_next: false,
			segments: vec![],
		}
	}

	fn position(&self, offset: usize) -> Position {
		self.lines.position(self.source, offset)
	}

	/// Find the next `{%` or `{#` at or after the cursor.
	fn next_opening(&self) -> Option<(usize, u8)> {
		let bytes = self.source.as_bytes();
		let mut index = self.cursor;

		while let Some(relative) = memchr(&bytes[index..], b'{') {
			let open = index + relative;
			match bytes.get(open + 1) {
				Some(marker @ (b'%' | b'#')) => return Some((open, *marker)),
				Some(_) => index = open + 1,
				None => return None,
			}
		}

		None
	}

	fn read_tag(&self, open: usize) -> Option<RawTag<'a>> {
		let bytes = self.source.as_bytes();
		let inner_start = open + 2;
		let rest = &bytes[inner_start..];
		let inner_end = inner_start + find_tag_end(rest).or_else(|| memstr(rest, b"%}"))?;
		let mut inner = &self.source[inner_start..inner_end];

		let trim_before = inner.starts_with('-');
		if trim_before || inner.starts_with('+') {
			inner = &inner[1..];
		}
		let trim_after = inner.ends_with('-');
		if trim_after || inner.ends_with('+') {
			inner = &inner[..inner.len() - 1];
		}

		Some(RawTag {
			start: open,
			end: inner_end + 2,
			inner: inner.trim(),
			trim_before,
			trim_after,
		})
	}

	/// Emit the pending text up to `end`.
	fn push_text(&mut self, end: usize, trim_end: bool) {
		let mut start = self.text_start;
		let mut content = &self.source[start..end];

		if self.trim_next {
			let trimmed = content.trim_start();
			start += content.len() - trimmed.len();
			content = trimmed;
			self.trim_next = false;
		}
		if trim_end {
			content = content.trim_end();
		}

		if !content.is_empty() {
			self.segments.push(Segment::Text {
				content: content.to_string(),
				position: self.position(start),
			});
		}
	}

	/// Skip past the matching `{% endraw %}` so that palette tags inside a raw
	/// section stay literal.
	fn skip_raw(&mut self) {
		while let Some((open, marker)) = self.next_opening() {
			if marker == b'#' {
				self.cursor = open + 2;
				continue;
			}
			let Some(tag) = self.read_tag(open) else {
				self.cursor = self.source.len();
				return;
			};
			self.cursor = tag.end;
			if tag.keyword() == "endraw" {
				return;
			}
		}

		self.cursor = self.source.len();
	}

	fn process(&mut self) -> PaletteResult<()> {
		while let Some((open, marker)) = self.next_opening() {
			if marker == b'#' {
				let bytes = self.source.as_bytes();
				let Some(close) = memstr(&bytes[open + 2..], b"#}") else {
					break;
				};
				self.cursor = open + 2 + close + 2;
				continue;
			}

			let Some(raw) = self.read_tag(open) else {
				break;
			};
			let keyword = raw.keyword();

			if keyword == "raw" {
				self.cursor = raw.end;
				self.skip_raw();
				continue;
			}

			let Some(kind) = TagKind::from_keyword(keyword) else {
				self.cursor = raw.end;
				continue;
			};

			self.push_text(raw.start, raw.trim_before);
			let position = self.position(raw.start);
			let tokens = tokenize_arguments(raw.arguments(), position)?;
			self.segments.push(Segment::Tag(Tag {
				kind,
				tokens,
				position,
			}));

			self.text_start = raw.end;
			self.cursor = raw.end;
			self.trim_next = raw.trim_after;
		}

		self.push_text(self.source.len(), false);
		Ok(())
	}
}

/// Tokenize the arguments of a palette tag. `position` is the location of the
/// tag itself and is used for error reporting.
fn tokenize_arguments(arguments: &str, position: Position) -> PaletteResult<Vec<TagToken>> {
	let mut tokens = vec![];

	for (result, span) in RawToken::lexer(arguments).spanned() {
		let slice = &arguments[span];
		let Ok(raw) = result else {
			return Err(PaletteError::Syntax {
				message: format!("unexpected `{slice}` in tag arguments"),
				line: position.line,
				column: position.column,
			});
		};

		let token = match raw {
			RawToken::Equals => TagToken::Equals,
			RawToken::Word => TagToken::Word(slice.to_string()),
			RawToken::DoubleQuotedString => TagToken::Quoted(unquote(slice, position)?, b'"'),
			RawToken::SingleQuotedString => TagToken::Quoted(unquote(slice, position)?, b'\''),
		};
		tokens.push(token);
	}

	Ok(tokens)
}

/// Strip surrounding quotes and resolve escapes.
fn unquote(slice: &str, position: Position) -> PaletteResult<String> {
	let inner = &slice[1..slice.len() - 1];

	if !inner.contains('\\') {
		return Ok(inner.to_string());
	}

	// Single quotes only escape themselves.
	if slice.starts_with('\'') {
		return Ok(inner.replace("\\'", "'"));
	}

	unescape(slice).map_err(|error| {
		PaletteError::Syntax {
			message: format!("invalid escape in {slice}: {error}"),
			line: position.line,
			column: position.column,
		}
	})
}

/// Split template source into text segments and palette tags.
///
/// Jinja comments (`{# ... #}`) and `{% raw %}` sections are passed through as
/// text without looking for palette tags inside them.
pub fn tokenize(source: &str) -> PaletteResult<Vec<Segment>> {
	let mut walker = SegmentWalker::new(source);
	walker.process()?;
	Ok(walker.segments)
}

/// The offset of the `%}` closing a tag, skipping quoted strings so that a
/// value like `title="{% if a %}A{% endif %}"` stays in one piece. `None` when
/// a quote is left open.
fn find_tag_end(bytes: &[u8]) -> Option<usize> {
	let mut quote = None;
	let mut index = 0;

	while index < bytes.len() {
		let byte = bytes[index];
		match quote {
			Some(_) if byte == b'\\' => index += 1,
			Some(open) if byte == open => quote = None,
			Some(_) => {}
			None if byte == b'"' || byte == b'\'' => quote = Some(byte),
			None if byte == b'%' && bytes.get(index + 1) == Some(&b'}') => return Some(index),
			None => {}
		}
		index += 1;
	}

	None
}

fn memchr(haystack: &[u8], needle: u8) -> Option<usize> {
	haystack.iter().position(|byte| *byte == needle)
}

pub fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}
