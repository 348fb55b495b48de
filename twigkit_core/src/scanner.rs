use logos::Lexer;
use logos::Logos;
use serde::Deserialize;
use serde::Serialize;

use crate::Point;
use crate::Position;

/// Tokens recognised between template regions.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum TextToken {
	#[regex(r"\{\{[-~]?")]
	OutputOpen,
	#[regex(r"\{%[-~]?")]
	StatementOpen,
	#[regex(r"\{#[-~]?")]
	CommentOpen,
	#[token("\n")]
	Newline,
	#[token("{")]
	Brace,
	#[regex(r"[^{\n]+")]
	Text,
}

/// Tokens recognised inside output and statement regions. Quoted strings are
/// a single token so a closing delimiter inside a string does not end the
/// region.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum ExpressionToken {
	#[regex(r"[-~]?\}\}")]
	OutputClose,
	#[regex(r"[-~]?%\}")]
	StatementClose,
	#[regex(r#""([^"\\\n]|\\.)*""#)]
	DoubleQuoted,
	#[regex(r"'([^'\\\n]|\\.)*'")]
	SingleQuoted,
	#[token("\n")]
	Newline,
	#[regex(r#"[^}%\-~'"\n]+"#)]
	Content,
	#[regex(r#"[}%\-~'"]"#)]
	Punct,
}

/// Tokens recognised inside comments, where only `#}` matters.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum CommentToken {
	#[regex(r"[-~]?#\}")]
	CommentClose,
	#[token("\n")]
	Newline,
	#[regex(r"[^#\-~\n]+")]
	Content,
	#[regex(r"[#\-~]")]
	Punct,
}

/// The kind of a scanned region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
	/// Literal text between template regions.
	Text,
	/// `{{ … }}`
	Output,
	/// `{% … %}`
	Statement,
	/// `{# … #}`
	Comment,
	/// `{{` with no `}}` before the end of its line.
	UnterminatedOutput,
	/// `{%` with no `%}` before the end of its line.
	UnterminatedStatement,
	/// `{#` with no `#}` before the end of its line.
	UnterminatedComment,
}

impl RegionKind {
	pub fn is_unterminated(self) -> bool {
		matches!(
			self,
			Self::UnterminatedOutput | Self::UnterminatedStatement | Self::UnterminatedComment
		)
	}

	/// True for the three terminated template region kinds.
	pub fn is_template(self) -> bool {
		matches!(self, Self::Output | Self::Statement | Self::Comment)
	}

	fn unterminated(self) -> Self {
		match self {
			Self::Output => Self::UnterminatedOutput,
			Self::Statement => Self::UnterminatedStatement,
			Self::Comment => Self::UnterminatedComment,
			other => other,
		}
	}
}

/// A contiguous slice of the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
	pub kind: RegionKind,
	pub position: Position,
	pub raw: String,
}

impl Region {
	/// The 1-indexed line the region starts on.
	pub fn line(&self) -> usize {
		self.position.start.line
	}

	/// The 1-indexed column the region starts at.
	pub fn column(&self) -> usize {
		self.position.start.column
	}

	/// The region body with delimiters, whitespace-control markers and
	/// surrounding whitespace removed. Text regions return their raw text.
	pub fn content(&self) -> &str {
		if self.kind == RegionKind::Text {
			return &self.raw;
		}

		let mut body = self.raw.get(2..).unwrap_or_default();
		body = body.strip_prefix(['-', '~']).unwrap_or(body);

		if !self.kind.is_unterminated() {
			body = body.get(..body.len().saturating_sub(2)).unwrap_or_default();
			body = body.strip_suffix(['-', '~']).unwrap_or(body);
		}

		body.trim()
	}
}

/// How newlines inside a template region are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
	/// A region must close on the line it opens on.
	Line,
	/// Regions may span lines. An opener that is never closed still ends at
	/// the end of its own line.
	Document,
}

enum BodyOutcome {
	Closed,
	Unterminated,
}

/// Drives the text, expression and comment lexers over the source,
/// switching between them with [`Lexer::morph`].
struct RegionWalker<'a> {
	source: &'a str,
	mode: ScanMode,
	cursor: Point,
	text_start: Option<Point>,
	regions: Vec<Region>,
}

impl<'a> RegionWalker<'a> {
	fn new(source: &'a str, mode: ScanMode, start: Point) -> Self {
		Self {
			source,
			mode,
			cursor: start,
			text_start: None,
			regions: vec![],
		}
	}

	fn relative(&self, point: Point, start: Point) -> usize {
		point.offset - start.offset
	}

	fn push_text(&mut self, slice: &str) {
		if self.text_start.is_none() {
			self.text_start = Some(self.cursor);
		}

		self.cursor.advance_str(slice);
	}

	fn flush_text(&mut self, origin: Point) {
		let Some(start) = self.text_start.take() else {
			return;
		};

		let from = self.relative(start, origin);
		let to = self.relative(self.cursor, origin);
		self.regions.push(Region {
			kind: RegionKind::Text,
			position: Position::from_points(start, self.cursor),
			raw: self.source[from..to].to_string(),
		});
	}

	fn push_region(&mut self, kind: RegionKind, start: Point, origin: Point) {
		let from = self.relative(start, origin);
		let to = self.relative(self.cursor, origin);
		self.regions.push(Region {
			kind,
			position: Position::from_points(start, self.cursor),
			raw: self.source[from..to].to_string(),
		});
	}

	/// Walk an expression or comment body until its closer, a newline in line
	/// mode, or the end of input.
	fn walk_body<T>(&mut self, lexer: &mut Lexer<'a, T>, closes: impl Fn(&T) -> bool) -> BodyOutcome
	where
		T: Logos<'a, Source = str> + PartialEq,
	{
		while let Some(token) = lexer.next() {
			let slice = lexer.slice();

			if slice == "\n" && self.mode == ScanMode::Line {
				return BodyOutcome::Unterminated;
			}

			self.cursor.advance_str(slice);

			if token.as_ref().is_ok_and(&closes) {
				return BodyOutcome::Closed;
			}
		}

		BodyOutcome::Unterminated
	}

	fn process(mut self) -> Vec<Region> {
		let origin = self.cursor;
		let mut lexer = TextToken::lexer(self.source);

		while let Some(token) = lexer.next() {
			let slice = lexer.slice();
			let kind = match token {
				Ok(TextToken::OutputOpen) => RegionKind::Output,
				Ok(TextToken::StatementOpen) => RegionKind::Statement,
				Ok(TextToken::CommentOpen) => RegionKind::Comment,
				Ok(TextToken::Newline | TextToken::Brace | TextToken::Text) | Err(()) => {
					self.push_text(slice);
					continue;
				}
			};

			self.flush_text(origin);
			let start = self.cursor;
			self.cursor.advance_str(slice);

			let outcome = if kind == RegionKind::Comment {
				let mut body = lexer.morph::<CommentToken>();
				let outcome = self.walk_body(&mut body, |token| *token == CommentToken::CommentClose);
				lexer = body.morph();
				outcome
			} else {
				let closer = if kind == RegionKind::Output {
					ExpressionToken::OutputClose
				} else {
					ExpressionToken::StatementClose
				};
				let mut body = lexer.morph::<ExpressionToken>();
				let outcome = self.walk_body(&mut body, |token| *token == closer);
				lexer = body.morph();
				outcome
			};

			if let BodyOutcome::Closed = outcome {
				self.push_region(kind, start, origin);
				continue;
			}

			// An unterminated region ends with its line. Scanning resumes from
			// the newline that follows it.
			let line_end = self.source[self.relative(start, origin)..]
				.find('\n')
				.map_or(self.source.len(), |index| {
					self.relative(start, origin) + index
				});
			self.cursor = start.advanced(&self.source[self.relative(start, origin)..line_end]);
			self.push_region(kind.unterminated(), start, origin);
			lexer = TextToken::lexer(&self.source[line_end..]);
		}

		self.flush_text(origin);
		self.regions
	}
}

/// Scan a single line into regions. `line_number` is 1-indexed and becomes
/// the line of every region; columns count from 1 and offsets from the
/// start of the line.
pub fn scan_line(line: &str, line_number: usize) -> Vec<Region> {
	RegionWalker::new(line, ScanMode::Line, Point::new(line_number, 1, 0)).process()
}

/// Scan every line of `text` independently. The outer index is the 0-indexed
/// line.
pub fn scan_lines(text: &str) -> Vec<Vec<Region>> {
	text.lines()
		.enumerate()
		.map(|(index, line)| scan_line(line, index + 1))
		.collect()
}

/// Scan the whole document, letting terminated regions span lines.
pub fn scan_document(text: &str) -> Vec<Region> {
	RegionWalker::new(text, ScanMode::Document, Point::default()).process()
}

/// Collapse runs of whitespace just inside the delimiters of a template
/// region to a single space. `{{foo}}` is left alone; `{{   foo   }}`
/// becomes `{{ foo }}`.
pub fn normalize_delimiter_spacing(raw: &str) -> String {
	let opener_len = if raw.len() > 2 && matches!(raw.as_bytes()[2], b'-' | b'~') {
		3
	} else {
		2
	};
	let closer_len = if raw.len() > opener_len + 2
		&& matches!(raw.as_bytes()[raw.len() - 3], b'-' | b'~')
	{
		3
	} else {
		2
	};

	if raw.len() < opener_len + closer_len {
		return raw.to_string();
	}

	let opener = &raw[..opener_len];
	let closer = &raw[raw.len() - closer_len..];
	let body = &raw[opener_len..raw.len() - closer_len];
	let trimmed = body.trim();

	if trimmed.is_empty() {
		return if body.is_empty() {
			raw.to_string()
		} else {
			format!("{opener} {closer}")
		};
	}

	let leading = if body.starts_with(char::is_whitespace) {
		" "
	} else {
		""
	};
	let trailing = if body.ends_with(char::is_whitespace) {
		" "
	} else {
		""
	};

	format!("{opener}{leading}{trimmed}{trailing}{closer}")
}
