use std::fmt::Display;

use derive_more::Deref;
use serde::Deserialize;
use serde::Serialize;
use serde::ser::SerializeStruct;
use tracing::debug;

use crate::BlockTag;
use crate::Region;
use crate::RegionKind;
use crate::TagRole;
use crate::classifier::classify_statement;
use crate::classifier::filter_calls;
use crate::classifier::mask_strings;
use crate::scanner::scan_line;
use crate::vocabulary::is_known_filter;

/// The broad class a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
	/// A region that is not terminated or is malformed.
	Syntax,
	/// Block tags that do not nest or close correctly.
	Structural,
	/// Names outside the vocabulary.
	Semantic,
	/// Soft formatting advice.
	Style,
}

impl Display for Category {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Syntax => write!(f, "syntax"),
			Self::Structural => write!(f, "structural"),
			Self::Semantic => write!(f, "semantic"),
			Self::Style => write!(f, "style"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiagnosticKind {
	UnclosedOutput,
	UnclosedStatement,
	UnclosedComment,
	EmptyOutput,
	EmptyStatement,
	UnknownTag { name: String },
	UnknownFilter { name: String },
	MissingFilterName,
	UnexpectedCloser { tag: BlockTag },
	MismatchedCloser { expected: BlockTag, found: BlockTag },
	UnclosedBlock { tag: BlockTag },
	InvalidForLoop,
	InvalidSet,
	IncludeNotString,
	OperatorSpacing { operator: String },
}

impl DiagnosticKind {
	pub fn category(&self) -> Category {
		match self {
			Self::UnclosedOutput
			| Self::UnclosedStatement
			| Self::UnclosedComment
			| Self::EmptyOutput
			| Self::EmptyStatement
			| Self::MissingFilterName
			| Self::InvalidForLoop
			| Self::InvalidSet
			| Self::IncludeNotString => Category::Syntax,
			Self::UnexpectedCloser { .. }
			| Self::MismatchedCloser { .. }
			| Self::UnclosedBlock { .. } => Category::Structural,
			Self::UnknownTag { .. } | Self::UnknownFilter { .. } => Category::Semantic,
			Self::OperatorSpacing { .. } => Category::Style,
		}
	}

	pub fn message(&self) -> String {
		match self {
			Self::UnclosedOutput => "unclosed variable output".to_string(),
			Self::UnclosedStatement => "unclosed block statement".to_string(),
			Self::UnclosedComment => "unclosed comment".to_string(),
			Self::EmptyOutput => "empty variable expression".to_string(),
			Self::EmptyStatement => "empty block statement".to_string(),
			Self::UnknownTag { name } => format!("unknown tag `{name}`"),
			Self::UnknownFilter { name } => format!("unknown filter `{name}`"),
			Self::MissingFilterName => "missing filter name after `|`".to_string(),
			Self::UnexpectedCloser { tag } => {
				format!("unexpected `{}` with no opening tag", tag.closer())
			}
			Self::MismatchedCloser { expected, found } => {
				format!(
					"mismatched tag: expected `{}`, found `{}`",
					expected.closer(),
					found.closer()
				)
			}
			Self::UnclosedBlock { tag } => format!("unclosed `{tag}` block"),
			Self::InvalidForLoop => "invalid for loop: missing `in`".to_string(),
			Self::InvalidSet => "invalid set syntax".to_string(),
			Self::IncludeNotString => "include path must be a string literal".to_string(),
			Self::OperatorSpacing { operator } => {
				format!("operator `{operator}` should be surrounded by spaces")
			}
		}
	}
}

/// A line-addressed analysis finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
	/// 1-indexed line.
	pub line: usize,
	/// 1-indexed column of the region the finding belongs to.
	pub column: usize,
	pub kind: DiagnosticKind,
}

impl Diagnostic {
	pub fn new(line: usize, column: usize, kind: DiagnosticKind) -> Self {
		Self { line, column, kind }
	}

	fn at(region: &Region, kind: DiagnosticKind) -> Self {
		Self::new(region.line(), region.column(), kind)
	}

	pub fn message(&self) -> String {
		self.kind.message()
	}

	pub fn category(&self) -> Category {
		self.kind.category()
	}

	/// Style findings are advice; everything else is an error.
	pub fn is_error(&self) -> bool {
		self.category() != Category::Style
	}
}

impl Serialize for Diagnostic {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("Diagnostic", 4)?;
		state.serialize_field("line", &self.line)?;
		state.serialize_field("column", &self.column)?;
		state.serialize_field("message", &self.message())?;
		state.serialize_field("category", &self.category())?;
		state.end()
	}
}

/// The ordered result of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
	pub fn has_errors(&self) -> bool {
		self.0.iter().any(Diagnostic::is_error)
	}

	pub fn error_count(&self) -> usize {
		self.0.iter().filter(|diagnostic| diagnostic.is_error()).count()
	}

	pub fn warning_count(&self) -> usize {
		self.0.len() - self.error_count()
	}

	pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Diagnostic> {
		self.0
			.iter()
			.filter(move |diagnostic| diagnostic.category() == category)
	}

	pub fn into_inner(self) -> Vec<Diagnostic> {
		self.0
	}
}

impl From<Vec<Diagnostic>> for Diagnostics {
	fn from(mut diagnostics: Vec<Diagnostic>) -> Self {
		diagnostics.sort_by_key(|diagnostic| diagnostic.line);
		Self(diagnostics)
	}
}

impl IntoIterator for Diagnostics {
	type IntoIter = std::vec::IntoIter<Diagnostic>;
	type Item = Diagnostic;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

/// Switches for the optional checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LintOptions {
	/// Report binary operators written without surrounding whitespace.
	pub operator_spacing: bool,
	/// Report `{{ }}` with nothing inside.
	pub empty_expression: bool,
}

impl Default for LintOptions {
	fn default() -> Self {
		Self {
			operator_spacing: true,
			empty_expression: true,
		}
	}
}

struct NestingFrame {
	tag: BlockTag,
	line: usize,
	column: usize,
}

/// Analyse `text` line by line and return every diagnostic, ordered by line.
/// Analysis never fails.
pub fn analyze(text: &str, options: &LintOptions) -> Diagnostics {
	let mut diagnostics = vec![];
	let mut stack: Vec<NestingFrame> = vec![];

	for (index, line) in text.lines().enumerate() {
		for region in scan_line(line, index + 1) {
			match region.kind {
				RegionKind::Text | RegionKind::Comment => {}
				RegionKind::UnterminatedOutput => {
					diagnostics.push(Diagnostic::at(&region, DiagnosticKind::UnclosedOutput));
				}
				RegionKind::UnterminatedStatement => {
					diagnostics.push(Diagnostic::at(&region, DiagnosticKind::UnclosedStatement));
				}
				RegionKind::UnterminatedComment => {
					diagnostics.push(Diagnostic::at(&region, DiagnosticKind::UnclosedComment));
				}
				RegionKind::Output => check_output(&region, options, &mut diagnostics),
				RegionKind::Statement => {
					check_statement(&region, options, &mut stack, &mut diagnostics);
				}
			}
		}
	}

	// A `set` left open is also a malformed assignment: `{% set x %}` with no
	// `endset` is missing its `= value`.
	for frame in stack {
		if frame.tag == BlockTag::Set {
			diagnostics.push(Diagnostic::new(
				frame.line,
				frame.column,
				DiagnosticKind::InvalidSet,
			));
		}
		diagnostics.push(Diagnostic::new(
			frame.line,
			frame.column,
			DiagnosticKind::UnclosedBlock { tag: frame.tag },
		));
	}

	let diagnostics = Diagnostics::from(diagnostics);
	debug!(
		lines = text.lines().count(),
		diagnostics = diagnostics.len(),
		"analysis finished"
	);

	diagnostics
}

fn check_output(region: &Region, options: &LintOptions, diagnostics: &mut Vec<Diagnostic>) {
	let content = region.content();

	if content.is_empty() {
		if options.empty_expression {
			diagnostics.push(Diagnostic::at(region, DiagnosticKind::EmptyOutput));
		}
		return;
	}

	for call in filter_calls(content) {
		if call.name.is_empty() {
			diagnostics.push(Diagnostic::at(region, DiagnosticKind::MissingFilterName));
		} else if !is_known_filter(&call.name) {
			diagnostics.push(Diagnostic::at(
				region,
				DiagnosticKind::UnknownFilter { name: call.name },
			));
		}
	}

	if options.operator_spacing {
		check_operator_spacing(region, content, diagnostics);
	}
}

fn check_statement(
	region: &Region,
	options: &LintOptions,
	stack: &mut Vec<NestingFrame>,
	diagnostics: &mut Vec<Diagnostic>,
) {
	let content = region.content();

	if content.is_empty() {
		diagnostics.push(Diagnostic::at(region, DiagnosticKind::EmptyStatement));
		return;
	}

	let tag = classify_statement(content);

	match tag.role {
		TagRole::Unknown => {
			diagnostics.push(Diagnostic::at(
				region,
				DiagnosticKind::UnknownTag {
					name: tag.unknown_name().to_string(),
				},
			));
		}
		TagRole::Open(block) => {
			stack.push(NestingFrame {
				tag: block,
				line: region.line(),
				column: region.column(),
			});
		}
		TagRole::Close(block) => {
			match stack.pop() {
				None => {
					diagnostics.push(Diagnostic::at(
						region,
						DiagnosticKind::UnexpectedCloser { tag: block },
					));
				}
				Some(frame) if frame.tag != block => {
					diagnostics.push(Diagnostic::at(
						region,
						DiagnosticKind::MismatchedCloser {
							expected: frame.tag,
							found: block,
						},
					));
				}
				Some(_) => {}
			}
		}
		TagRole::Branch | TagRole::Inline => {}
	}

	if !tag.is_closing {
		match tag.keyword.as_str() {
			"for" if !format!(" {content} ").contains(" in ") => {
				diagnostics.push(Diagnostic::at(region, DiagnosticKind::InvalidForLoop));
			}
			"set" if tag.args.is_empty() => {
				diagnostics.push(Diagnostic::at(region, DiagnosticKind::InvalidSet));
			}
			"include" if !tag.args.contains(['\'', '"']) => {
				diagnostics.push(Diagnostic::at(region, DiagnosticKind::IncludeNotString));
			}
			_ => {}
		}
	}

	if options.operator_spacing {
		check_operator_spacing(region, content, diagnostics);
	}
}

const SYMBOL_OPERATORS: [&str; 13] = [
	"==", "!=", "<", ">", ">=", "<=", "+", "-", "/", "*", "%", "//", "**",
];

const WORD_OPERATORS: [&str; 7] = ["not in", "is not", "matches", "and", "in", "is", "or"];

fn is_operator_char(ch: char) -> bool {
	matches!(ch, '=' | '!' | '<' | '>' | '+' | '-' | '/' | '*' | '%')
}

fn is_word_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || ch == '_'
}

/// Report each operator at most once per region when it is glued to its
/// operands. String literals are masked first. A `+` or `-` that follows
/// another operator, an opening bracket, a comma or the start of the
/// expression is treated as a sign.
fn check_operator_spacing(region: &Region, content: &str, diagnostics: &mut Vec<Diagnostic>) {
	let masked = mask_strings(content);
	let chars: Vec<char> = masked.chars().collect();
	let mut reported: Vec<&str> = vec![];

	let mut index = 0;
	while index < chars.len() {
		if !is_operator_char(chars[index]) {
			index += 1;
			continue;
		}

		let start = index;
		while index < chars.len() && is_operator_char(chars[index]) {
			index += 1;
		}

		let run: String = chars[start..index].iter().collect();
		let Some(operator) = SYMBOL_OPERATORS.iter().find(|op| **op == run) else {
			continue;
		};

		let before = start.checked_sub(1).map(|i| chars[i]);
		let after = chars.get(index).copied();

		if matches!(*operator, "+" | "-") {
			let previous = chars[..start].iter().rev().find(|ch| !ch.is_whitespace());
			let is_sign = previous
				.is_none_or(|&ch| !(is_word_char(ch) || matches!(ch, ')' | ']' | '\'' | '"')));
			if is_sign || before.is_some_and(char::is_whitespace) {
				continue;
			}
		}

		let spaced =
			before.is_none_or(char::is_whitespace) && after.is_none_or(char::is_whitespace);
		if !spaced && !reported.contains(operator) {
			reported.push(*operator);
		}
	}

	for operator in WORD_OPERATORS {
		let mut search = 0;
		while let Some(found) = masked[search..].find(operator) {
			let start = search + found;
			let end = start + operator.len();
			search = end;

			let before = masked[..start].chars().next_back();
			let after = masked[end..].chars().next();

			if before.is_some_and(|ch| is_word_char(ch) || ch == '.')
				|| after.is_some_and(is_word_char)
			{
				continue;
			}

			let spaced =
				before.is_none_or(char::is_whitespace) && after.is_none_or(char::is_whitespace);
			if !spaced && !reported.contains(&operator) {
				reported.push(operator);
			}
		}
	}

	for operator in reported {
		diagnostics.push(Diagnostic::at(
			region,
			DiagnosticKind::OperatorSpacing {
				operator: operator.to_string(),
			},
		));
	}
}
