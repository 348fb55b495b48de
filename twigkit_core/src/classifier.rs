use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Region;
use crate::RegionKind;
use crate::vocabulary::BRANCH_TAGS;
use crate::vocabulary::is_known_tag;

/// Statement tags that open a block closed by `end<tag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
	If,
	For,
	Block,
	Macro,
	Embed,
	Set,
	Apply,
	Verbatim,
	With,
}

impl BlockTag {
	pub const ALL: [BlockTag; 9] = [
		Self::If,
		Self::For,
		Self::Block,
		Self::Macro,
		Self::Embed,
		Self::Set,
		Self::Apply,
		Self::Verbatim,
		Self::With,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::If => "if",
			Self::For => "for",
			Self::Block => "block",
			Self::Macro => "macro",
			Self::Embed => "embed",
			Self::Set => "set",
			Self::Apply => "apply",
			Self::Verbatim => "verbatim",
			Self::With => "with",
		}
	}

	/// The keyword that closes this block, e.g. `endif`.
	pub fn closer(self) -> String {
		format!("end{}", self.as_str())
	}
}

impl Display for BlockTag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for BlockTag {
	type Err = String;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|tag| tag.as_str() == value)
			.ok_or_else(|| value.to_string())
	}
}

/// What a statement does to the nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRole {
	/// Opens a block that needs a closer.
	Open(BlockTag),
	/// Closes a block.
	Close(BlockTag),
	/// `else` or `elseif`.
	Branch,
	/// A known statement with no nesting effect: terminal tags, their
	/// closers and inline `set` assignments.
	Inline,
	/// The keyword is not part of the vocabulary.
	Unknown,
}

/// A statement region broken into keyword and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTag {
	pub keyword: String,
	pub is_closing: bool,
	/// The keyword with a leading `end` removed for closers.
	pub base_type: String,
	pub args: String,
	pub role: TagRole,
}

impl ClassifiedTag {
	/// The name reported when the tag is not in the vocabulary.
	pub fn unknown_name(&self) -> &str {
		if self.base_type.is_empty() {
			&self.keyword
		} else {
			&self.base_type
		}
	}
}

/// Classify the trimmed content of a statement region.
pub fn classify_statement(content: &str) -> ClassifiedTag {
	let content = content.trim();
	let keyword_len = content
		.find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
		.unwrap_or(content.len());
	let (keyword, args) = if keyword_len == 0 {
		content
			.split_once(char::is_whitespace)
			.unwrap_or((content, ""))
	} else {
		content.split_at(keyword_len)
	};
	let args = args.trim();

	let is_closing = keyword.starts_with("end");
	let base_type = if is_closing { &keyword[3..] } else { keyword };

	let role = if is_closing {
		if let Ok(tag) = base_type.parse::<BlockTag>() {
			TagRole::Close(tag)
		} else if is_known_tag(base_type) {
			TagRole::Inline
		} else {
			TagRole::Unknown
		}
	} else if let Ok(tag) = keyword.parse::<BlockTag>() {
		if tag == BlockTag::Set && (args.is_empty() || args.contains('=')) {
			TagRole::Inline
		} else {
			TagRole::Open(tag)
		}
	} else if BRANCH_TAGS.contains(&keyword) {
		TagRole::Branch
	} else if is_known_tag(keyword) {
		TagRole::Inline
	} else {
		TagRole::Unknown
	};

	ClassifiedTag {
		keyword: keyword.to_string(),
		is_closing,
		base_type: base_type.to_string(),
		args: args.to_string(),
		role,
	}
}

/// The effect of one statement on nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingEvent {
	Open(BlockTag),
	Close(BlockTag),
	Branch,
}

/// The nesting events of the terminated statement regions in `regions`, in
/// order.
pub fn nesting_events<'r>(regions: impl IntoIterator<Item = &'r Region>) -> Vec<NestingEvent> {
	regions
		.into_iter()
		.filter(|region| region.kind == RegionKind::Statement)
		.filter_map(|region| {
			match classify_statement(region.content()).role {
				TagRole::Open(tag) => Some(NestingEvent::Open(tag)),
				TagRole::Close(tag) => Some(NestingEvent::Close(tag)),
				TagRole::Branch => Some(NestingEvent::Branch),
				TagRole::Inline | TagRole::Unknown => None,
			}
		})
		.collect()
}

/// A `|name(args)` application inside an output expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCall {
	/// The leading identifier of the segment. Empty when the pipe is not
	/// followed by a name.
	pub name: String,
	pub segment: String,
}

/// Split an expression on `|` outside string literals and return every
/// filter applied to it.
pub fn filter_calls(expression: &str) -> Vec<FilterCall> {
	split_outside_strings(expression, '|')
		.into_iter()
		.skip(1)
		.map(|segment| {
			let trimmed = segment.trim();
			let name_len = trimmed
				.find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
				.unwrap_or(trimmed.len());
			FilterCall {
				name: trimmed[..name_len].to_string(),
				segment: trimmed.to_string(),
			}
		})
		.collect()
}

/// Split `text` on `separator` wherever it is not inside a quoted string.
pub fn split_outside_strings(text: &str, separator: char) -> Vec<&str> {
	let mut parts = vec![];
	let mut quote: Option<char> = None;
	let mut escaped = false;
	let mut start = 0;

	for (index, ch) in text.char_indices() {
		if let Some(open) = quote {
			if escaped {
				escaped = false;
			} else if ch == '\\' {
				escaped = true;
			} else if ch == open {
				quote = None;
			}
			continue;
		}

		if ch == '"' || ch == '\'' {
			quote = Some(ch);
		} else if ch == separator {
			parts.push(&text[start..index]);
			start = index + ch.len_utf8();
		}
	}

	parts.push(&text[start..]);
	parts
}

/// Replace the contents of string literals with `x`, keeping the quotes and
/// the byte length of the text.
pub fn mask_strings(text: &str) -> String {
	let mut masked = String::with_capacity(text.len());
	let mut quote: Option<char> = None;
	let mut escaped = false;

	for ch in text.chars() {
		match quote {
			Some(open) => {
				if escaped {
					escaped = false;
				} else if ch == '\\' {
					escaped = true;
				} else if ch == open {
					quote = None;
					masked.push(ch);
					continue;
				}

				for _ in 0..ch.len_utf8() {
					masked.push('x');
				}
			}
			None => {
				if ch == '"' || ch == '\'' {
					quote = Some(ch);
				}
				masked.push(ch);
			}
		}
	}

	masked
}
