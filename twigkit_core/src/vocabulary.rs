//! The fixed template vocabulary.
//!
//! Every list here feeds both validation and completion. A name that is only
//! offered as a completion would never be flagged as unknown by the
//! validator, so both consumers read from the same tables.

use serde::Serialize;

/// A named vocabulary entry with a short human description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entry {
	pub name: &'static str,
	pub detail: &'static str,
}

const fn entry(name: &'static str, detail: &'static str) -> Entry {
	Entry { name, detail }
}

/// A tag snippet with numbered `${n:placeholder}` stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snippet {
	pub name: &'static str,
	pub detail: &'static str,
	pub body: &'static str,
}

const fn snippet(name: &'static str, detail: &'static str, body: &'static str) -> Snippet {
	Snippet { name, detail, body }
}

/// Markup elements that never take a closing tag.
pub const VOID_ELEMENTS: [&str; 14] = [
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

/// Container elements folded by the fixed-pair fallback.
pub const FOLD_PAIRS: [(&str, &str); 9] = [
	("<ul>", "</ul>"),
	("<ol>", "</ol>"),
	("<table>", "</table>"),
	("<tr>", "</tr>"),
	("<form>", "</form>"),
	("<head>", "</head>"),
	("<body>", "</body>"),
	("<style>", "</style>"),
	("<script>", "</script>"),
];

/// Statement keywords that do not change nesting depth for the validator.
pub const TERMINAL_TAGS: [&str; 11] = [
	"extends",
	"include",
	"import",
	"from",
	"use",
	"do",
	"flush",
	"sandbox",
	"cache",
	"deprecated",
	"autoescape",
];

/// Same-level markers inside an open block.
pub const BRANCH_TAGS: [&str; 2] = ["else", "elseif"];

/// Every statement keyword accepted by the tag classifier.
pub const TAGS: [Entry; 22] = [
	entry("if", "Conditional block"),
	entry("for", "Loop block"),
	entry("set", "Set variable"),
	entry("block", "Define template block"),
	entry("macro", "Define reusable content"),
	entry("embed", "Embed template with blocks"),
	entry("apply", "Apply filter to content"),
	entry("verbatim", "Display raw content"),
	entry("with", "Isolated variable scope"),
	entry("else", "Alternative for if"),
	entry("elseif", "Additional condition"),
	entry("extends", "Inherit from template"),
	entry("include", "Include template"),
	entry("import", "Import macros"),
	entry("from", "Import specific macros"),
	entry("use", "Use a template horizontally"),
	entry("do", "Evaluate an expression"),
	entry("flush", "Flush the output"),
	entry("sandbox", "Sandbox untrusted code"),
	entry("cache", "Cache a template fragment"),
	entry("deprecated", "Mark as deprecated"),
	entry("autoescape", "Auto-escape variables"),
];

/// Closing keywords offered as completions.
pub const CLOSERS: [Entry; 13] = [
	entry("endapply", "End apply block"),
	entry("endautoescape", "End autoescape block"),
	entry("endblock", "End block definition"),
	entry("endcache", "End cache block"),
	entry("enddeprecated", "End deprecated block"),
	entry("endembed", "End embed block"),
	entry("endfor", "End for loop"),
	entry("endif", "End if statement"),
	entry("endmacro", "End macro definition"),
	entry("endsandbox", "End sandbox block"),
	entry("endset", "End set block"),
	entry("endverbatim", "End verbatim block"),
	entry("endwith", "End with block"),
];

/// Words that appear inside statements but never start one.
pub const KEYWORDS: [Entry; 4] = [
	entry("in", "Used in for loops"),
	entry("as", "Used in for loops"),
	entry("only", "Include without context"),
	entry("ignore missing", "Skip missing files"),
];

pub const SNIPPETS: [Snippet; 16] = [
	snippet(
		"if",
		"Conditional block",
		"{% if ${1:condition} %}\n    ${2:content}\n{% endif %}",
	),
	snippet(
		"if-else",
		"Conditional with else",
		"{% if ${1:condition} %}\n    ${2:content}\n{% else %}\n    ${3:else_content}\n{% endif %}",
	),
	snippet(
		"for",
		"Loop block",
		"{% for ${1:item} in ${2:items} %}\n    ${3:content}\n{% endfor %}",
	),
	snippet(
		"for-else",
		"Loop with empty case",
		"{% for ${1:item} in ${2:items} %}\n    ${3:content}\n{% else %}\n    ${4:empty_content}\n{% \
		 endfor %}",
	),
	snippet("set", "Set variable", "{% set ${1:variable} = ${2:value} %}"),
	snippet(
		"set-block",
		"Set with content block",
		"{% set ${1:variable} %}\n    ${2:content}\n{% endset %}",
	),
	snippet(
		"block",
		"Define template block",
		"{% block ${1:name} %}\n    ${2:content}\n{% endblock %}",
	),
	snippet(
		"extends",
		"Inherit from template",
		"{% extends '${1:template}' %}",
	),
	snippet("include", "Include template", "{% include '${1:template}' %}"),
	snippet(
		"embed",
		"Embed template with blocks",
		"{% embed '${1:template}' %}\n    {% block ${2:name} %}\n        ${3:content}\n    {% endblock \
		 %}\n{% endembed %}",
	),
	snippet(
		"macro",
		"Define reusable content",
		"{% macro ${1:name}(${2:params}) %}\n    ${3:content}\n{% endmacro %}",
	),
	snippet(
		"import",
		"Import macros",
		"{% import '${1:template}' as ${2:macros} %}",
	),
	snippet(
		"from",
		"Import specific macros",
		"{% from '${1:template}' import ${2:macros} %}",
	),
	snippet(
		"with",
		"Isolated variable scope",
		"{% with ${1:vars} %}\n    ${2:content}\n{% endwith %}",
	),
	snippet(
		"apply",
		"Apply filter to content",
		"{% apply ${1:filter} %}\n    ${2:content}\n{% endapply %}",
	),
	snippet(
		"verbatim",
		"Display raw content",
		"{% verbatim %}\n    ${1:content}\n{% endverbatim %}",
	),
];

pub const FUNCTIONS: [Entry; 39] = [
	entry("attribute", "attribute(object, method) - Access dynamic attributes"),
	entry("block", "block(name) - Render a block"),
	entry("constant", "constant(name) - Get a constant value"),
	entry("cycle", "cycle(array, position) - Cycle through values"),
	entry("date", "date(date, timezone) - Create a date"),
	entry("dump", "dump(var) - Debug a variable"),
	entry("html_classes", "html_classes(class1, class2) - Generate HTML classes"),
	entry("include", "include(template, variables) - Include a template"),
	entry("line", "line(number) - Get current line number"),
	entry("max", "max(values) - Get maximum value"),
	entry("min", "min(values) - Get minimum value"),
	entry("parent", "parent() - Render parent block"),
	entry("random", "random(values) - Get random value"),
	entry("range", "range(low, high, step) - Create a range"),
	entry("source", "source(name) - Get template source"),
	entry("template_from_string", "template_from_string(template) - Create template"),
	entry("country_select", "country_select(countries) - Generate country selector"),
	entry("country_timezones", "country_timezones(country) - Get country timezones"),
	entry("format_args_as_text", "format_args_as_text(args) - Format arguments"),
	entry("get_debug_type", "get_debug_type(value) - Get debug type of value"),
	entry("profiler_dump", "profiler_dump(value) - Dump for profiler"),
	entry("language_names", "language_names() - Get available languages"),
	entry("locale_names", "locale_names() - Get available locales"),
	entry("script_names", "script_names() - Get available scripts"),
	entry("timezone_names", "timezone_names() - Get available timezones"),
	entry("array_keys", "array_keys(array) - Get all keys of an array"),
	entry("array_merge", "array_merge(array1, array2) - Merge two arrays"),
	entry("array_slice", "array_slice(array, start, length) - Extract part of array"),
	entry("array_filter", "array_filter(array, callback) - Filter array elements"),
	entry("array_map", "array_map(callback, array) - Apply callback to array"),
	entry("array_reduce", "array_reduce(array, callback) - Reduce array to value"),
	entry("form_widget", "form_widget(form) - Render entire form"),
	entry("form_errors", "form_errors(form) - Render form errors"),
	entry("form_label", "form_label(form) - Render form label"),
	entry("form_row", "form_row(form) - Render form row"),
	entry("form_rest", "form_rest(form) - Render remaining form"),
	entry("form_start", "form_start(form) - Begin form tag"),
	entry("form_end", "form_end(form) - End form tag"),
	entry("csrf_token", "csrf_token(intention) - Get CSRF token"),
];

pub const FILTERS: [Entry; 59] = [
	entry("abs", "Absolute value"),
	entry("batch", "Split into batches"),
	entry("capitalize", "Capitalize first letter"),
	entry("column", "Extract array column"),
	entry("convert_encoding", "Convert encoding"),
	entry("country_name", "Convert country code to name"),
	entry("currency_name", "Convert currency code to name"),
	entry("currency_symbol", "Get currency symbol"),
	entry("data_uri", "Create data URI"),
	entry("date", "Format date"),
	entry("date_modify", "Modify date"),
	entry("default", "Default value if empty"),
	entry("e", "Short alias of escape"),
	entry("escape", "HTML escape"),
	entry("filter", "Filter array elements"),
	entry("first", "Get first item"),
	entry("format", "Format string with placeholders"),
	entry("format_currency", "Format currency value"),
	entry("format_date", "Format date with locale"),
	entry("format_datetime", "Format date and time"),
	entry("format_number", "Format number with locale"),
	entry("format_time", "Format time with locale"),
	entry("html_to_markdown", "Convert HTML to markdown"),
	entry("humanize", "Humanize text (under_score to Under Score)"),
	entry("inky_to_html", "Convert Inky to HTML"),
	entry("inline_css", "Inline CSS styles"),
	entry("join", "Join array items to string"),
	entry("json_encode", "Encode to JSON"),
	entry("keys", "Get array keys"),
	entry("language_name", "Convert language code to name"),
	entry("last", "Get last item"),
	entry("length", "Get length of string or array"),
	entry("locale_name", "Convert locale code to name"),
	entry("lower", "Convert to lowercase"),
	entry("map", "Apply function to array"),
	entry("markdown", "Convert markdown to HTML"),
	entry("markdown_to_html", "Convert markdown to HTML"),
	entry("merge", "Merge arrays or add to array"),
	entry("nl2br", "Convert newlines to <br>"),
	entry("number_format", "Format number"),
	entry("raw", "Mark value as safe (no escaping)"),
	entry("reduce", "Reduce array to single value"),
	entry("replace", "Replace text"),
	entry("reverse", "Reverse string or array"),
	entry("round", "Round number"),
	entry("slice", "Extract slice of array or string"),
	entry("slug", "Convert to URL slug"),
	entry("sort", "Sort array"),
	entry("spaceless", "Remove whitespace between HTML"),
	entry("split", "Split string into array"),
	entry("striptags", "Strip HTML tags"),
	entry("timezone_name", "Convert timezone to name"),
	entry("title", "Title case"),
	entry("trim", "Trim whitespace"),
	entry("u", "Create Symfony UnicodeString"),
	entry("upper", "Convert to uppercase"),
	entry("url_encode", "Encode URL"),
	entry("yaml_dump", "Convert to YAML"),
	entry("yaml_encode", "Encode as YAML"),
];

pub const TESTS: [Entry; 15] = [
	entry("constant", "Is a constant"),
	entry("date", "Is a valid date"),
	entry("defined", "Is variable defined"),
	entry("divisible by", "Is divisible by a number"),
	entry("empty", "Is empty"),
	entry("even", "Is even number"),
	entry("iterable", "Can be looped"),
	entry("null", "Is null"),
	entry("odd", "Is odd number"),
	entry("same as", "Is the same as"),
	entry("none", "Is null"),
	entry("starts with", "String starts with"),
	entry("ends with", "String ends with"),
	entry("in", "Value is in array"),
	entry("json", "Is valid JSON"),
];

fn find(entries: &'static [Entry], name: &str) -> Option<&'static Entry> {
	entries.iter().find(|entry| entry.name == name)
}

pub fn is_known_tag(name: &str) -> bool {
	find(&TAGS, name).is_some()
}

pub fn is_known_filter(name: &str) -> bool {
	find(&FILTERS, name).is_some()
}

pub fn is_known_function(name: &str) -> bool {
	find(&FUNCTIONS, name).is_some()
}

pub fn is_known_test(name: &str) -> bool {
	find(&TESTS, name).is_some()
}

pub fn is_void_element(name: &str) -> bool {
	VOID_ELEMENTS
		.iter()
		.any(|element| element.eq_ignore_ascii_case(name))
}

/// Which vocabulary list a looked up word came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
	Tag,
	Closer,
	Filter,
	Function,
	Test,
	Keyword,
}

impl std::fmt::Display for EntryKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Tag => write!(f, "tag"),
			Self::Closer => write!(f, "closing tag"),
			Self::Filter => write!(f, "filter"),
			Self::Function => write!(f, "function"),
			Self::Test => write!(f, "test"),
			Self::Keyword => write!(f, "keyword"),
		}
	}
}

/// Every vocabulary entry named `word`, in tag, closer, filter, function,
/// test, keyword order. Names such as `date` or `block` live in more than
/// one list.
pub fn lookup(word: &str) -> Vec<(EntryKind, &'static Entry)> {
	let tables: [(EntryKind, &'static [Entry]); 6] = [
		(EntryKind::Tag, &TAGS),
		(EntryKind::Closer, &CLOSERS),
		(EntryKind::Filter, &FILTERS),
		(EntryKind::Function, &FUNCTIONS),
		(EntryKind::Test, &TESTS),
		(EntryKind::Keyword, &KEYWORDS),
	];

	tables
		.into_iter()
		.filter_map(|(kind, entries)| find(entries, word).map(|entry| (kind, entry)))
		.collect()
}
