use serde::Serialize;

use crate::RegionKind;
use crate::classifier::mask_strings;
use crate::scanner::scan_line;
use crate::vocabulary::CLOSERS;
use crate::vocabulary::Entry;
use crate::vocabulary::FILTERS;
use crate::vocabulary::FUNCTIONS;
use crate::vocabulary::KEYWORDS;
use crate::vocabulary::SNIPPETS;
use crate::vocabulary::TAGS;
use crate::vocabulary::TESTS;

/// A single completion item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Completion {
	/// A statement tag inserted as a multi-line snippet.
	TagSnippet {
		name: &'static str,
		detail: &'static str,
		snippet: &'static str,
	},
	Filter(Entry),
	Function(Entry),
	Test(Entry),
	/// Tags without a snippet, closers and plain keywords.
	Keyword(Entry),
}

impl Completion {
	pub fn name(&self) -> &'static str {
		match self {
			Self::TagSnippet { name, .. } => *name,
			Self::Filter(entry) | Self::Function(entry) | Self::Test(entry) | Self::Keyword(entry) => {
				entry.name
			}
		}
	}

	pub fn detail(&self) -> &'static str {
		match self {
			Self::TagSnippet { detail, .. } => *detail,
			Self::Filter(entry) | Self::Function(entry) | Self::Test(entry) | Self::Keyword(entry) => {
				entry.detail
			}
		}
	}

	/// The snippet body with `${n:text}` stops, if this item has one.
	pub fn snippet(&self) -> Option<&'static str> {
		match self {
			Self::TagSnippet { snippet, .. } => Some(*snippet),
			_ => None,
		}
	}
}

/// Where the cursor sits relative to the template syntax of its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionContext {
	/// After a `|` inside an output or statement.
	Filter,
	/// After `is ` inside an output or statement.
	Test,
	/// Directly after `{%`.
	Tag,
	/// Naming the target of a `set`. Nothing is offered.
	SetTarget,
	/// Anywhere else inside an open output or statement.
	Expression,
	/// Outside any template region.
	None,
}

/// The items offered at a cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionList {
	pub context: CompletionContext,
	/// 0-indexed character column where the word being typed starts. The
	/// completion replaces text from here to the cursor.
	pub start: usize,
	/// The word being typed.
	pub prefix: String,
	pub items: Vec<Completion>,
}

fn is_word_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || ch == '_'
}

/// Split `text` into everything before its trailing word and the word.
fn split_trailing_word(text: &str) -> (&str, &str) {
	let start = text
		.char_indices()
		.rev()
		.take_while(|(_, ch)| is_word_char(*ch))
		.last()
		.map_or(text.len(), |(index, _)| index);

	text.split_at(start)
}

/// Work out the completion context of `body`, the text of an open region
/// after its opening delimiter.
fn detect_context(kind: RegionKind, body: &str) -> CompletionContext {
	let masked = mask_strings(body);
	let (before, _) = split_trailing_word(&masked);
	let trimmed = before.trim_end();

	if trimmed.ends_with('|') {
		return CompletionContext::Filter;
	}

	if before.len() > trimmed.len() {
		let (head, last) = split_trailing_word(trimmed);
		if last == "is" || (last == "not" && split_trailing_word(head.trim_end()).1 == "is") {
			return CompletionContext::Test;
		}
	}

	if kind == RegionKind::UnterminatedStatement {
		if trimmed.is_empty() {
			return CompletionContext::Tag;
		}

		if trimmed.trim_start() == "set" && before.len() > trimmed.len() {
			return CompletionContext::SetTarget;
		}
	}

	CompletionContext::Expression
}

fn tag_items() -> Vec<Completion> {
	let snippets = SNIPPETS.iter().map(|snippet| {
		Completion::TagSnippet {
			name: snippet.name,
			detail: snippet.detail,
			snippet: snippet.body,
		}
	});
	let plain_tags = TAGS
		.iter()
		.filter(|tag| !SNIPPETS.iter().any(|snippet| snippet.name == tag.name))
		.copied()
		.map(Completion::Keyword);
	let closers = CLOSERS.iter().copied().map(Completion::Keyword);
	let keywords = KEYWORDS.iter().copied().map(Completion::Keyword);

	snippets.chain(plain_tags).chain(closers).chain(keywords).collect()
}

fn function_items() -> Vec<Completion> {
	FUNCTIONS.iter().copied().map(Completion::Function).collect()
}

/// Keep the items whose name contains `prefix`, ignoring case, with
/// names that start with it first.
fn filter_by_prefix(items: Vec<Completion>, prefix: &str) -> Vec<Completion> {
	if prefix.is_empty() {
		return items;
	}

	let prefix = prefix.to_ascii_lowercase();
	let (mut leading, inner): (Vec<_>, Vec<_>) = items
		.into_iter()
		.filter(|item| item.name().to_ascii_lowercase().contains(&prefix))
		.partition(|item| item.name().to_ascii_lowercase().starts_with(&prefix));

	leading.extend(inner);
	leading
}

/// The completions for a cursor at the end of `line_prefix`, the text of
/// the current line up to the cursor.
pub fn completions_at(line_prefix: &str) -> CompletionList {
	let (_, word) = split_trailing_word(line_prefix);
	let start = line_prefix.chars().count() - word.chars().count();
	let open_region = scan_line(line_prefix, 1)
		.into_iter()
		.last()
		.filter(|region| {
			matches!(
				region.kind,
				RegionKind::UnterminatedOutput | RegionKind::UnterminatedStatement
			)
		});

	let context = open_region.as_ref().map_or(CompletionContext::None, |region| {
		let opener_len = if region.raw[2..].starts_with(['-', '~']) {
			3
		} else {
			2
		};
		detect_context(region.kind, &region.raw[opener_len..])
	});

	let items = match context {
		CompletionContext::None | CompletionContext::SetTarget => vec![],
		_ if word.to_ascii_lowercase().starts_with("array_") => {
			function_items()
				.into_iter()
				.filter(|item| item.name().starts_with("array_"))
				.collect()
		}
		CompletionContext::Filter => FILTERS.iter().copied().map(Completion::Filter).collect(),
		CompletionContext::Test => TESTS.iter().copied().map(Completion::Test).collect(),
		CompletionContext::Tag => tag_items(),
		CompletionContext::Expression => function_items(),
	};

	CompletionList {
		context,
		start,
		prefix: word.to_string(),
		items: filter_by_prefix(items, word),
	}
}

/// A snippet with its stops replaced by their placeholder text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedSnippet {
	pub text: String,
	/// 0-indexed `(line, column)` of the first stop, relative to the start
	/// of the snippet.
	pub cursor: Option<(usize, usize)>,
}

/// Parse a `${n:text}` stop at the start of `text` into its number, its
/// placeholder and the text after it.
fn parse_stop(text: &str) -> Option<(usize, &str, &str)> {
	let stop = text.strip_prefix("${")?;
	let number_len = stop.bytes().take_while(u8::is_ascii_digit).count();
	let number = stop[..number_len].parse().ok()?;
	let inner = stop[number_len..].strip_prefix(':')?;
	let close = inner.find('}')?;

	Some((number, &inner[..close], &inner[close + 1..]))
}

/// Replace every `${n:text}` stop in `body` with `text` and prefix each
/// line after the first with `indent`.
pub fn expand_snippet(body: &str, indent: &str) -> ExpandedSnippet {
	let mut text = String::with_capacity(body.len());
	let mut cursor: Option<(usize, usize, usize)> = None;
	let mut line = 0;
	let mut column = 0;
	let mut rest = body;

	while !rest.is_empty() {
		if let Some((number, placeholder, remainder)) = parse_stop(rest) {
			if cursor.is_none_or(|(best, ..)| number < best) {
				cursor = Some((number, line, column));
			}

			text.push_str(placeholder);
			column += placeholder.chars().count();
			rest = remainder;
			continue;
		}

		let Some(ch) = rest.chars().next() else {
			break;
		};
		rest = &rest[ch.len_utf8()..];
		text.push(ch);

		if ch == '\n' {
			text.push_str(indent);
			line += 1;
			column = indent.chars().count();
		} else {
			column += 1;
		}
	}

	ExpandedSnippet {
		text,
		cursor: cursor.map(|(_, line, column)| (line, column)),
	}
}
