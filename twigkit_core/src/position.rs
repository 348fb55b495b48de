use serde::Deserialize;
use serde::Serialize;

/// A location inside a document.
///
/// `line` and `column` are 1-indexed and count characters, `offset` is the
/// 0-indexed byte offset into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Default for Point {
	fn default() -> Self {
		Self::new(1, 1, 0)
	}
}

impl Point {
	pub const fn new(line: usize, column: usize, offset: usize) -> Self {
		Self {
			line,
			column,
			offset,
		}
	}

	/// Move the point past `text`.
	pub fn advance_str(&mut self, text: &str) {
		for ch in text.chars() {
			if ch == '\n' {
				self.line += 1;
				self.column = 1;
			} else {
				self.column += 1;
			}

			self.offset += ch.len_utf8();
		}
	}

	/// A copy of this point moved past `text`.
	#[must_use]
	pub fn advanced(mut self, text: &str) -> Self {
		self.advance_str(text);
		self
	}
}

/// A half-open span between two points. `end` points just past the last
/// character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
	pub start: Point,
	pub end: Point,
}

impl Position {
	pub const fn new(
		start_line: usize,
		start_column: usize,
		start_offset: usize,
		end_line: usize,
		end_column: usize,
		end_offset: usize,
	) -> Self {
		Self {
			start: Point::new(start_line, start_column, start_offset),
			end: Point::new(end_line, end_column, end_offset),
		}
	}

	pub const fn from_points(start: Point, end: Point) -> Self {
		Self { start, end }
	}

	pub fn spans_lines(&self) -> bool {
		self.start.line != self.end.line
	}

	pub fn byte_range(&self) -> std::ops::Range<usize> {
		self.start.offset..self.end.offset
	}
}
