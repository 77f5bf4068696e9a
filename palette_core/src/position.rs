use serde::Deserialize;
use serde::Serialize;

/// A location in template source.
///
/// `line` and `column` are 1-indexed, `offset` is the 0-indexed byte offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Position {
	pub const fn new(line: usize, column: usize, offset: usize) -> Self {
		Self {
			line,
			column,
			offset,
		}
	}
}

impl std::fmt::Display for Position {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Maps byte offsets to line and column positions.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
	line_starts: Vec<usize>,
}

impl LineIndex {
	pub(crate) fn new(source: &str) -> Self {
		let mut line_starts = vec![0];
		line_starts.extend(
			source
				.bytes()
				.enumerate()
				.filter(|(_, byte)| *byte == b'\n')
				.map(|(index, _)| index + 1),
		);

		Self { line_starts }
	}

	/// Columns count characters, not bytes.
	pub(crate) fn position(&self, source: &str, offset: usize) -> Position {
		let line = match self.line_starts.binary_search(&offset) {
			Ok(line) => line,
			Err(next) => next - 1,
		};
		let line_start = self.line_starts[line];
		let column = source
			.get(line_start..offset)
			.map_or(offset - line_start, |prefix| prefix.chars().count());

		Position::new(line + 1, column + 1, offset)
	}
}
