use logos::Lexer;
use logos::Logos;

use crate::vocabulary::is_void_element;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum TextToken {
	#[regex(r"<[A-Za-z][A-Za-z0-9:-]*")]
	OpenStart,
	#[regex(r"</[A-Za-z][A-Za-z0-9:-]*[ \t]*>")]
	Close,
	#[token("<!--")]
	CommentOpen,
	#[regex(r"\{[{%#]")]
	TemplateOpen,
	#[token("\n")]
	Newline,
	#[token("<")]
	Lt,
	#[token("{")]
	Brace,
	#[regex(r"[^<{\n]+")]
	Text,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum TagToken {
	#[token(">")]
	End,
	#[token("/>")]
	SelfClosingEnd,
	#[regex(r#""[^"]*""#)]
	DoubleQuoted,
	#[regex(r"'[^']*'")]
	SingleQuoted,
	#[regex(r"\{[{%#]")]
	TemplateOpen,
	#[token("\n")]
	Newline,
	#[regex(r#"[^>/"'{\n]+"#)]
	Attribute,
	#[regex(r#"[/"'{]"#)]
	Punct,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum CommentToken {
	#[token("-->")]
	End,
	#[token("\n")]
	Newline,
	#[regex(r"[^-\n]+")]
	Content,
	#[token("-")]
	Dash,
}

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupTagKind {
	/// `<name …>` for an element that needs a closing tag.
	Open,
	/// `</name>`
	Close,
	/// `<name …/>`
	SelfClosing,
	/// `<br>`, `<img>` and the other elements that never take a closing tag.
	Void,
}

/// A start or end tag found in markup text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTag {
	/// Lowercased element name.
	pub name: String,
	pub kind: MarkupTagKind,
	/// 0-indexed line the tag starts on.
	pub line: usize,
}

impl MarkupTag {
	/// `+1` for an opening tag, `-1` for a closing tag, `0` otherwise.
	pub fn depth_delta(&self) -> isize {
		match self.kind {
			MarkupTagKind::Open => 1,
			MarkupTagKind::Close => -1,
			MarkupTagKind::SelfClosing | MarkupTagKind::Void => 0,
		}
	}
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
	haystack
		.as_bytes()
		.windows(needle.len())
		.position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

fn count_newlines(text: &str) -> usize {
	text.bytes().filter(|byte| *byte == b'\n').count()
}

/// Byte length of a template region body up to and including `closer`.
/// Quoted strings in expressions hide the closer. A region that never closes
/// ends with its line.
fn template_body_len(rest: &str, closer: &str, quoted: bool) -> usize {
	let mut quote: Option<char> = None;
	let mut escaped = false;

	for (index, ch) in rest.char_indices() {
		if let Some(open) = quote {
			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == open || ch == '\n' {
				quote = None;
			}
			continue;
		}

		if quoted && matches!(ch, '"' | '\'') {
			quote = Some(ch);
		} else if rest[index..].starts_with(closer) {
			return index + closer.len();
		}
	}

	rest.find('\n').unwrap_or(rest.len())
}

/// Element tags in `text`, in source order. Comments, template regions and
/// the content of `<script>` and `<style>` are skipped. A tag is attributed
/// to the line its `<` is on.
pub fn markup_tags(text: &str) -> MarkupTags<'_> {
	MarkupTags {
		lexer: Some(TextToken::lexer(text)),
		line: 0,
	}
}

/// Lazy scanner behind [`markup_tags`]. Stopping early leaves the rest of
/// the text unread.
pub struct MarkupTags<'a> {
	lexer: Option<Lexer<'a, TextToken>>,
	line: usize,
}

impl<'a> MarkupTags<'a> {
	fn skip_template<T>(&mut self, lexer: &mut Lexer<'a, T>, opener: &str)
	where
		T: Logos<'a, Source = str>,
	{
		let (closer, quoted) = match opener {
			"{#" => ("#}", false),
			"{%" => ("%}", true),
			_ => ("}}", true),
		};
		let rest = lexer.remainder();
		let len = template_body_len(rest, closer, quoted);
		self.line += count_newlines(&rest[..len]);
		lexer.bump(len);
	}

	fn skip_comment(&mut self, lexer: Lexer<'a, TextToken>) -> Lexer<'a, TextToken> {
		let mut comment: Lexer<'a, CommentToken> = lexer.morph();

		while let Some(token) = comment.next() {
			self.line += count_newlines(comment.slice());
			if token == Ok(CommentToken::End) {
				break;
			}
		}

		comment.morph()
	}

	/// Read the rest of a start tag. Returns `None` for a tag that never
	/// reaches its `>`.
	fn start_tag(
		&mut self,
		lexer: Lexer<'a, TextToken>,
		name: String,
	) -> (Option<MarkupTag>, Lexer<'a, TextToken>) {
		let start_line = self.line;
		let mut tag_lexer: Lexer<'a, TagToken> = lexer.morph();
		let mut end = None;

		while let Some(token) = tag_lexer.next() {
			match token {
				Ok(TagToken::End) => {
					end = Some(MarkupTagKind::Open);
					break;
				}
				Ok(TagToken::SelfClosingEnd) => {
					end = Some(MarkupTagKind::SelfClosing);
					break;
				}
				Ok(TagToken::TemplateOpen) => {
					let opener = tag_lexer.slice();
					self.skip_template(&mut tag_lexer, opener);
				}
				_ => self.line += count_newlines(tag_lexer.slice()),
			}
		}

		let kind = match end {
			None => return (None, tag_lexer.morph()),
			Some(MarkupTagKind::Open) if is_void_element(&name) => MarkupTagKind::Void,
			Some(kind) => kind,
		};

		if kind == MarkupTagKind::Open && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
			let closing = format!("</{name}");
			let rest = tag_lexer.remainder();
			let skip = find_ignore_ascii_case(rest, &closing).unwrap_or(rest.len());
			self.line += count_newlines(&rest[..skip]);
			tag_lexer.bump(skip);
		}

		let tag = MarkupTag {
			name,
			kind,
			line: start_line,
		};

		(Some(tag), tag_lexer.morph())
	}
}

impl Iterator for MarkupTags<'_> {
	type Item = MarkupTag;

	fn next(&mut self) -> Option<MarkupTag> {
		let mut lexer = self.lexer.take()?;

		while let Some(token) = lexer.next() {
			let slice = lexer.slice();

			match token {
				Ok(TextToken::OpenStart) => {
					let name = slice[1..].to_ascii_lowercase();
					let (tag, rest) = self.start_tag(lexer, name);
					lexer = rest;

					if tag.is_some() {
						self.lexer = Some(lexer);
						return tag;
					}
				}
				Ok(TextToken::Close) => {
					let name = slice[2..slice.len() - 1].trim().to_ascii_lowercase();
					self.lexer = Some(lexer);
					return Some(MarkupTag {
						name,
						kind: MarkupTagKind::Close,
						line: self.line,
					});
				}
				Ok(TextToken::CommentOpen) => lexer = self.skip_comment(lexer),
				Ok(TextToken::TemplateOpen) => self.skip_template(&mut lexer, slice),
				Ok(TextToken::Newline) => self.line += 1,
				Ok(TextToken::Lt | TextToken::Brace | TextToken::Text) | Err(()) => {}
			}
		}

		None
	}
}

/// Group the tags found in `text` by their 0-indexed line.
pub fn markup_tags_by_line(text: &str, line_count: usize) -> Vec<Vec<MarkupTag>> {
	let mut lines = vec![Vec::new(); line_count];

	for tag in markup_tags(text) {
		if let Some(bucket) = lines.get_mut(tag.line) {
			bucket.push(tag);
		}
	}

	lines
}
