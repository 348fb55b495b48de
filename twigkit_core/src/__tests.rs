use std::path::Path;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::vocabulary::CLOSERS;
use crate::vocabulary::FILTERS;
use crate::vocabulary::SNIPPETS;
use crate::vocabulary::TAGS;
use crate::vocabulary::TERMINAL_TAGS;

fn summarize(diagnostics: &Diagnostics) -> Vec<(usize, String, Category)> {
	diagnostics
		.iter()
		.map(|diagnostic| (diagnostic.line, diagnostic.message(), diagnostic.category()))
		.collect()
}

fn kinds_and_raw(regions: &[Region]) -> Vec<(RegionKind, &str)> {
	regions
		.iter()
		.map(|region| (region.kind, region.raw.as_str()))
		.collect()
}

// --- Position tests ---

#[test]
fn point_advances_by_characters() {
	let point = Point::default().advanced("ab\ncé");
	assert_eq!(point, Point::new(2, 3, 6));
}

// --- Scanner tests ---

#[test]
fn scan_line_splits_text_and_regions() {
	let regions = scan_line("a {{ b }} c", 1);
	assert_eq!(
		kinds_and_raw(&regions),
		vec![
			(RegionKind::Text, "a "),
			(RegionKind::Output, "{{ b }}"),
			(RegionKind::Text, " c"),
		]
	);
	assert_eq!(regions[1].position, Position::new(1, 3, 2, 1, 10, 9));
	assert_eq!(regions[1].content(), "b");
}

#[rstest]
#[case::output("{{ foo", RegionKind::UnterminatedOutput)]
#[case::statement("{% if x", RegionKind::UnterminatedStatement)]
#[case::comment("{# note", RegionKind::UnterminatedComment)]
fn scan_line_reports_unterminated_regions(#[case] line: &str, #[case] expected: RegionKind) {
	let regions = scan_line(line, 4);
	assert_eq!(kinds_and_raw(&regions), vec![(expected, line)]);
	assert_eq!(regions[0].line(), 4);
	assert!(regions[0].kind.is_unterminated());
}

#[test]
fn scan_line_ignores_closers_inside_strings() {
	let regions = scan_line(r#"{{ "}}" }} tail"#, 1);
	assert_eq!(
		kinds_and_raw(&regions),
		vec![(RegionKind::Output, r#"{{ "}}" }}"#), (RegionKind::Text, " tail")]
	);
}

#[test]
fn scan_line_resumes_after_unterminated_region() {
	let regions = scan_line("{{ a {% if b %}", 1);
	assert_eq!(
		kinds_and_raw(&regions),
		vec![(RegionKind::UnterminatedOutput, "{{ a {% if b %}")]
	);
}

#[rstest]
#[case::dash("{%- if x -%}", "if x")]
#[case::tilde("{{~ name ~}}", "name")]
#[case::comment("{# a note #}", "a note")]
#[case::unterminated("{%- for x in y", "for x in y")]
fn region_content_strips_delimiters(#[case] line: &str, #[case] expected: &str) {
	let regions = scan_line(line, 1);
	assert_eq!(regions[0].content(), expected);
}

#[test]
fn scan_document_allows_multi_line_regions() {
	let regions = scan_document("{{\n x }}");
	assert_eq!(kinds_and_raw(&regions), vec![(RegionKind::Output, "{{\n x }}")]);
	assert_eq!(regions[0].position, Position::new(1, 1, 0, 2, 6, 8));
	assert!(regions[0].position.spans_lines());
}

#[test]
fn scan_document_ends_unterminated_region_at_its_line() {
	let regions = scan_document("{{ a\nplain");
	assert_eq!(
		kinds_and_raw(&regions),
		vec![
			(RegionKind::UnterminatedOutput, "{{ a"),
			(RegionKind::Text, "\nplain"),
		]
	);
}

#[test]
fn scan_lines_uses_one_entry_per_line() {
	let lines = scan_lines("{{ a }}\n\n{% b %}");
	assert_eq!(lines.len(), 3);
	assert!(lines[1].is_empty());
	assert_eq!(lines[2][0].line(), 3);
}

#[rstest]
#[case::collapses("{{   foo   }}", "{{ foo }}")]
#[case::tight("{{foo}}", "{{foo}}")]
#[case::markers("{%- if x  -%}", "{%- if x -%}")]
#[case::blank("{{   }}", "{{ }}")]
#[case::empty("{{}}", "{{}}")]
#[case::one_side("{{foo   }}", "{{foo }}")]
fn normalize_delimiter_spacing_cases(#[case] raw: &str, #[case] expected: &str) {
	assert_eq!(normalize_delimiter_spacing(raw), expected);
}

// --- Classifier tests ---

#[rstest]
#[case::open_if("if x", "if", TagRole::Open(BlockTag::If))]
#[case::close_if("endif", "endif", TagRole::Close(BlockTag::If))]
#[case::else_branch("else", "else", TagRole::Branch)]
#[case::elseif_branch("elseif y > 1", "elseif", TagRole::Branch)]
#[case::inline_set("set x = 1", "set", TagRole::Inline)]
#[case::block_set("set x", "set", TagRole::Open(BlockTag::Set))]
#[case::include("include 'a.twig'", "include", TagRole::Inline)]
#[case::terminal_closer("endcache", "endcache", TagRole::Inline)]
#[case::unknown("bogus", "bogus", TagRole::Unknown)]
#[case::unknown_closer("endbogus", "endbogus", TagRole::Unknown)]
#[case::call_syntax("for(x in y)", "for", TagRole::Open(BlockTag::For))]
fn classify_statement_roles(#[case] content: &str, #[case] keyword: &str, #[case] role: TagRole) {
	let tag = classify_statement(content);
	assert_eq!(tag.keyword, keyword);
	assert_eq!(tag.role, role);
}

#[test]
fn classify_statement_splits_closers() {
	let tag = classify_statement("endbogus");
	assert!(tag.is_closing);
	assert_eq!(tag.base_type, "bogus");
	assert_eq!(tag.unknown_name(), "bogus");

	let bare = classify_statement("end");
	assert_eq!(bare.unknown_name(), "end");
}

#[test]
fn nesting_events_skip_non_block_statements() {
	let regions = scan_line("{% if a %}{{ b }}{% else %}{% include 'c' %}{% endif %}", 1);
	assert_eq!(
		nesting_events(&regions),
		vec![
			NestingEvent::Open(BlockTag::If),
			NestingEvent::Branch,
			NestingEvent::Close(BlockTag::If),
		]
	);
}

#[test]
fn filter_calls_ignore_pipes_in_strings() {
	let names: Vec<String> = filter_calls("name|upper|default('a|b')")
		.into_iter()
		.map(|call| call.name)
		.collect();
	assert_eq!(names, vec!["upper", "default"]);
}

#[test]
fn mask_strings_keeps_length() {
	let masked = mask_strings(r#"a == 'b c' ~ "d\"e""#);
	assert_eq!(masked, r#"a == 'xxx' ~ "xxxx""#);
}

#[test]
fn block_tag_parses_and_names_closer() {
	for tag in BlockTag::ALL {
		assert_eq!(tag.as_str().parse::<BlockTag>(), Ok(tag));
	}
	assert_eq!(BlockTag::Verbatim.closer(), "endverbatim");
	assert_eq!("endif".parse::<BlockTag>(), Err("endif".to_string()));
}

// --- Validator tests ---

#[rstest]
#[case::balanced("{% if x %}a{% endif %}", vec![])]
#[case::mismatched(
	"{% if x %}a{% endfor %}",
	vec![(1, "mismatched tag: expected `endif`, found `endfor`", Category::Structural)]
)]
#[case::invalid_for(
	"{% for i %}a{% endfor %}",
	vec![(1, "invalid for loop: missing `in`", Category::Syntax)]
)]
#[case::unclosed_output("{{ foo", vec![(1, "unclosed variable output", Category::Syntax)])]
#[case::unclosed_statement("{% if", vec![(1, "unclosed block statement", Category::Syntax)])]
#[case::unclosed_comment("{# note", vec![(1, "unclosed comment", Category::Syntax)])]
#[case::unclosed_block("{% if x %}", vec![(1, "unclosed `if` block", Category::Structural)])]
#[case::unknown_tag("{% bogus %}", vec![(1, "unknown tag `bogus`", Category::Semantic)])]
#[case::unknown_closer("{% endbogus %}", vec![(1, "unknown tag `bogus`", Category::Semantic)])]
#[case::terminal_closer("{% endcache %}", vec![])]
#[case::unknown_filter("{{ x|bogus }}", vec![(1, "unknown filter `bogus`", Category::Semantic)])]
#[case::missing_filter("{{ x| }}", vec![(1, "missing filter name after `|`", Category::Syntax)])]
#[case::unexpected_closer(
	"{% endif %}",
	vec![(1, "unexpected `endif` with no opening tag", Category::Structural)]
)]
#[case::empty_set("{% set %}", vec![(1, "invalid set syntax", Category::Syntax)])]
#[case::unclosed_set_block(
	"{% set x %}\nhello",
	vec![
		(1, "invalid set syntax", Category::Syntax),
		(1, "unclosed `set` block", Category::Structural),
	]
)]
#[case::every_open_block_reported(
	"{% for a in b %}\n{% set x %}\n{% if c %}",
	vec![
		(1, "unclosed `for` block", Category::Structural),
		(2, "invalid set syntax", Category::Syntax),
		(2, "unclosed `set` block", Category::Structural),
		(3, "unclosed `if` block", Category::Structural),
	]
)]
#[case::set_block("{% set x %}a{% endset %}", vec![])]
#[case::include_variable(
	"{% include foo %}",
	vec![(1, "include path must be a string literal", Category::Syntax)]
)]
#[case::empty_output("{{ }}", vec![(1, "empty variable expression", Category::Syntax)])]
#[case::empty_statement("{% %}", vec![(1, "empty block statement", Category::Syntax)])]
#[case::operator_spacing(
	"{{ a==b }}",
	vec![(1, "operator `==` should be surrounded by spaces", Category::Style)]
)]
#[case::sign("{{ -1 }}", vec![])]
#[case::spaced_minus("{{ a - b }}", vec![])]
#[case::operator_in_string("{{ 'a==b' }}", vec![])]
#[case::branches("{% if a %}{% elseif b %}{% else %}{% endif %}", vec![])]
#[case::multi_line_output("{{ foo(\n  a) }}", vec![(1, "unclosed variable output", Category::Syntax)])]
#[case::ordered_by_line(
	"{{ a }}\n{% if b %}\n{{ c",
	vec![
		(2, "unclosed `if` block", Category::Structural),
		(3, "unclosed variable output", Category::Syntax),
	]
)]
#[case::crossed_blocks(
	"{% if a %}\n{% for b in c %}\n{% endif %}\n{% endfor %}",
	vec![
		(3, "mismatched tag: expected `endfor`, found `endif`", Category::Structural),
		(4, "mismatched tag: expected `endif`, found `endfor`", Category::Structural),
	]
)]
fn analyze_reports(#[case] text: &str, #[case] expected: Vec<(usize, &str, Category)>) {
	let diagnostics = analyze(text, &LintOptions::default());
	let expected: Vec<(usize, String, Category)> = expected
		.into_iter()
		.map(|(line, message, category)| (line, message.to_string(), category))
		.collect();
	assert_eq!(summarize(&diagnostics), expected);
}

#[test]
fn analyze_correct_nesting_has_no_structural_findings() {
	let diagnostics = analyze(LIST_PAGE, &LintOptions::default());
	assert_eq!(diagnostics.in_category(Category::Structural).count(), 0);
	assert!(diagnostics.is_empty());
}

#[rstest]
#[case::operator_spacing(
	"{{ a==b }}",
	LintOptions { operator_spacing: false, ..LintOptions::default() }
)]
#[case::empty_expression(
	"{{ }}",
	LintOptions { empty_expression: false, ..LintOptions::default() }
)]
fn analyze_optional_checks_can_be_disabled(#[case] text: &str, #[case] options: LintOptions) {
	assert!(analyze(text, &options).is_empty());
}

#[test]
fn diagnostics_count_errors_and_warnings() {
	let diagnostics = analyze("{{ a==b }}\n{% if x %}", &LintOptions::default());
	assert!(diagnostics.has_errors());
	assert_eq!(diagnostics.error_count(), 1);
	assert_eq!(diagnostics.warning_count(), 1);
}

#[test]
fn diagnostics_serialize_as_records() -> AnyEmptyResult {
	let diagnostics = analyze("{{ foo", &LintOptions::default());
	let value = serde_json::to_value(&diagnostics)?;
	assert_eq!(
		value,
		serde_json::json!([{
			"line": 1,
			"column": 1,
			"message": "unclosed variable output",
			"category": "syntax",
		}])
	);

	Ok(())
}

#[test]
#[traced_test]
fn analyze_logs_a_summary() {
	analyze("{{ a }}", &LintOptions::default());
	assert!(logs_contain("analysis finished"));
}

// --- Reflow tests ---

#[test]
fn reformat_indents_by_block_depth() -> TwigResult<()> {
	let formatted = reformat(LIST_PAGE, &BuiltinPrinter, &ReflowOptions::default())?;
	insta::assert_snapshot!(formatted.trim_end(), @r"
{% extends 'base.twig' %}
{% block content %}
    <ul>
    {% for item in items %}
        <li>{{ item.name|upper }}</li>
    {% else %}
        <li>none</li>
    {% endfor %}
    </ul>
{% endblock %}
");
	assert!(formatted.ends_with("{% endblock %}\n"));

	Ok(())
}

#[test]
fn reformat_with_markup_indent_keeps_element_nesting() -> TwigResult<()> {
	let options = ReflowOptions {
		markup_indent: true,
		..ReflowOptions::default()
	};
	let formatted = reformat(
		"{% if x %}\n<div>\n{{ y }}\n</div>\n{% endif %}\n",
		&BuiltinPrinter,
		&options,
	)?;
	assert_eq!(
		formatted,
		"{% if x %}\n    <div>\n        {{ y }}\n    </div>\n{% endif %}\n"
	);

	Ok(())
}

#[rstest]
#[case::block_depth(false, "{% if a %}\n\t<div>\n\t<p>x</p>\n\t</div>\n{% endif %}\n")]
#[case::markup_indent(true, "{% if a %}\n\t<div>\n\t\t<p>x</p>\n\t</div>\n{% endif %}\n")]
fn reformat_with_tabs_never_mixes_spaces(
	#[case] markup_indent: bool,
	#[case] expected: &str,
) -> TwigResult<()> {
	let options = ReflowOptions {
		markup_indent,
		printer: PrinterOptions {
			use_tabs: true,
			..PrinterOptions::default()
		},
	};
	let formatted = reformat(
		"{% if a %}\n<div>\n<p>x</p>\n</div>\n{% endif %}\n",
		&BuiltinPrinter,
		&options,
	)?;
	assert_eq!(formatted, expected);
	assert!(formatted.lines().all(|line| !line.starts_with(' ')));

	Ok(())
}

#[rstest]
#[case::list_page(LIST_PAGE, false)]
#[case::list_page_markup_indent(LIST_PAGE, true)]
#[case::nested(NESTED_BLOCKS, false)]
#[case::multi_line(MULTI_LINE_OUTPUT, false)]
#[case::branches("{% if a %}\nx\n{% else %}\ny\n{% endif %}\n", true)]
fn reformat_is_idempotent(#[case] text: &str, #[case] markup_indent: bool) -> TwigResult<()> {
	let options = ReflowOptions {
		markup_indent,
		..ReflowOptions::default()
	};
	let once = reformat(text, &BuiltinPrinter, &options)?;
	let twice = reformat(&once, &BuiltinPrinter, &options)?;
	assert_eq!(twice, once);

	Ok(())
}

#[test]
fn reformat_leaves_multi_line_regions_intact() -> TwigResult<()> {
	let formatted = reformat(MULTI_LINE_OUTPUT, &BuiltinPrinter, &ReflowOptions::default())?;
	assert_eq!(formatted, "{% if x %}\n    {{ foo(\n  a,\n  b) }}\n{% endif %}\n");

	Ok(())
}

#[test]
fn reformat_nested_blocks() -> TwigResult<()> {
	let formatted = reformat(NESTED_BLOCKS, &EchoPrinter, &ReflowOptions::default())?;
	assert_eq!(
		formatted,
		"{% if a %}\n    {% if b %}\n        x\n    {% endif %}\n{% endif %}"
	);

	Ok(())
}

#[test]
fn reformat_fails_when_printer_fails() {
	let result = reformat("{{ a }}", &FailingPrinter, &ReflowOptions::default());
	assert!(matches!(result, Err(TwigError::Printer(_))));
}

#[test]
fn reformat_fails_when_placeholder_is_lost() {
	let result = reformat("<div>{{ a }}</div>", &DroppingPrinter, &ReflowOptions::default());
	match result {
		Err(TwigError::PlaceholderLost(placeholder)) => assert_eq!(placeholder, "__TWIGKIT_0__"),
		other => panic!("expected a lost placeholder, got {other:?}"),
	}
}

#[test]
fn protect_avoids_placeholder_collisions() {
	let protected = protect("TWIGKIT {{ a }}");
	assert_eq!(protected.placeholder(0), "__TWIGKITX_0__");
	assert_eq!(protected.text, "TWIGKIT __TWIGKITX_0__");
	assert_eq!(protected.regions, vec!["{{ a }}".to_string()]);
}

#[test]
fn restore_rejects_duplicated_placeholders() -> TwigResult<()> {
	let protected = protect("{{ a }}{{ b }}");
	assert_eq!(
		protected.restore("__TWIGKIT_1__ __TWIGKIT_0__")?,
		"{{ b }} {{ a }}"
	);
	assert!(matches!(
		protected.restore("__TWIGKIT_0__ __TWIGKIT_0__"),
		Err(TwigError::PlaceholderLost(_))
	));

	Ok(())
}

#[test]
fn reindent_handles_tags_sharing_a_line() {
	let text = "{% if a %}{% if b %}\nx\n{% endif %}{% endif %}\n{% if c %}x{% endif %}";
	assert_eq!(
		reindent(text, "  ", false),
		"{% if a %}{% if b %}\n    x\n{% endif %}{% endif %}\n{% if c %}x{% endif %}"
	);
}

#[test]
fn builtin_printer_caps_blank_lines() -> TwigResult<()> {
	let printed = BuiltinPrinter.print("\n\n<p>\n\n\n\n</p>\n\n", &PrinterOptions::default())?;
	assert_eq!(printed, "<p>\n\n\n</p>\n");

	Ok(())
}

#[cfg(unix)]
#[test]
fn command_printer_runs_shell_commands() -> TwigResult<()> {
	let printed = CommandPrinter::new("cat").print("<p>hi</p>\n", &PrinterOptions::default())?;
	assert_eq!(printed, "<p>hi</p>\n");

	let formatted = reformat(
		"{% if x %}\n{{ y }}\n{% endif %}",
		&CommandPrinter::new("cat"),
		&ReflowOptions::default(),
	)?;
	assert_eq!(formatted, "{% if x %}\n    {{ y }}\n{% endif %}");

	Ok(())
}

#[cfg(unix)]
#[rstest]
#[case::status("exit 3", "command exited with status 3")]
#[case::stderr("echo broken >&2; exit 1", "broken")]
fn command_printer_reports_failures(#[case] command: &str, #[case] expected: &str) {
	let result = CommandPrinter::new(command).print("<p></p>", &PrinterOptions::default());
	match result {
		Err(TwigError::PrinterCommand { reason, .. }) => assert_eq!(reason, expected),
		other => panic!("expected a command failure, got {other:?}"),
	}
}

// --- Markup tests ---

#[test]
fn markup_tags_skip_template_regions() {
	let text = "<div title=\"{{ a > b }}\">{% if x > 1 %}\n<br>{# <p> #}<img/>\n<p {% if a > b %}hidden{% endif %}></p></div>";
	let tags: Vec<(String, MarkupTagKind, usize)> = markup_tags(text)
		.map(|tag| (tag.name, tag.kind, tag.line))
		.collect();
	let expected: Vec<(String, MarkupTagKind, usize)> = vec![
		("div".to_string(), MarkupTagKind::Open, 0),
		("br".to_string(), MarkupTagKind::Void, 1),
		("img".to_string(), MarkupTagKind::SelfClosing, 1),
		("p".to_string(), MarkupTagKind::Open, 2),
		("p".to_string(), MarkupTagKind::Close, 2),
		("div".to_string(), MarkupTagKind::Close, 2),
	];
	assert_eq!(tags, expected);
}

#[test]
fn markup_tags_stop_where_the_caller_stops() {
	let mut tags = markup_tags("<a>\n<b>\n<c>");
	assert_eq!(tags.next().map(|tag| tag.name), Some("a".to_string()));
	assert_eq!(tags.next().map(|tag| tag.line), Some(1));
}

#[test]
fn markup_tags_skip_comments_and_raw_text() {
	let names: Vec<String> = markup_tags("<!-- <div> -->\n<script>if (a < b) {}</script>\n<style>p > a {}</style>")
		.map(|tag| tag.name)
		.collect();
	assert_eq!(names, vec!["script", "script", "style", "style"]);
}

// --- Fold tests ---

#[rstest]
#[case::block("{% if x %}\n  a\n{% endif %}", 0, Some((0, 2, 11)))]
#[case::outer_block(NESTED_BLOCKS, 0, Some((0, 4, 11)))]
#[case::inner_block(NESTED_BLOCKS, 1, Some((1, 3, 11)))]
#[case::closed_on_line("{% if a %}x{% endif %}\n", 0, None)]
#[case::element("<div>\n  <p>hi</p>\n</div>", 0, Some((0, 2, 6)))]
#[case::element_closed_on_line("<div>\n  <p>hi</p>\n</div>", 1, None)]
#[case::element_case("<DIV>\n</div>", 0, Some((0, 1, 6)))]
#[case::void("<br>\n<img>", 0, None)]
#[case::masked_region("<div title=\"{{ '</div>' }}\">\n</div>", 0, Some((0, 1, 6)))]
#[case::pair_fallback("<ul>\n<ul>\n</ul>", 0, Some((0, 2, 5)))]
#[case::block_before_element("{% block a %}<div>\n</div>\n{% endblock %}", 0, Some((0, 2, 14)))]
#[case::past_end("{% if x %}", 3, None)]
#[case::self_closing_on_line("<div><br/>\n</div>", 0, None)]
#[case::void_on_line("<div><br>\n</div>", 0, Some((0, 1, 6)))]
#[case::region_in_text("<div>{{ '<div>' }}\n</div>", 0, Some((0, 1, 6)))]
#[case::late_line("{% endif %}\n</div>\n{% if a %}\nx\n{% endif %}", 2, Some((2, 4, 11)))]
fn resolve_fold_cases(
	#[case] text: &str,
	#[case] line: usize,
	#[case] expected: Option<(usize, usize, usize)>,
) {
	let expected = expected.map(|(from_line, to_line, to_col)| {
		FoldSpan {
			from_line,
			from_col: 0,
			to_line,
			to_col,
		}
	});
	assert_eq!(resolve_fold(text, line, 7), expected);
}

#[test]
fn fold_ranges_lists_every_span() {
	let spans = fold_ranges("{% if a %}\n<ul>\n<li>x</li>\n</ul>\n{% endif %}");
	let lines: Vec<(usize, usize)> = spans
		.iter()
		.map(|span| (span.from_line, span.to_line))
		.collect();
	assert_eq!(lines, vec![(0, 4), (1, 3)]);
}

#[rstest]
#[case::list_page(LIST_PAGE)]
#[case::nested(NESTED_BLOCKS)]
#[case::multi_line(MULTI_LINE_OUTPUT)]
#[case::mixed(
	"{% if a %}\n<div>\n<ul>\n<li>x</li>\n</ul>\n{% if b %}{% endif %}\n</div>\n<table>\n{% endif %}\n</table>"
)]
#[case::same_line_pairs("{% for a in b %}{% for c in d %}\n{% endfor %}\n{% endfor %}\n<ul><ul>\n</ul>\n</ul>")]
#[case::pair_fallback("<ul>\n<ul>\n</ul>\n<ul>\n</ul>")]
fn fold_ranges_agree_with_single_queries(#[case] text: &str) {
	let expected: Vec<FoldSpan> = (0..text.lines().count())
		.filter_map(|line| resolve_fold(text, line, 0))
		.collect();
	assert_eq!(fold_ranges(text), expected);
}

#[test]
fn fold_ranges_on_a_large_document() {
	let text = "{% if a %}\n<div>\n{% endif %}\n".repeat(5_000);
	let spans = fold_ranges(&text);
	let last = FoldSpan {
		from_line: 14_997,
		from_col: 0,
		to_line: 14_999,
		to_col: 11,
	};

	assert_eq!(spans.len(), 5_000);
	assert_eq!(spans.last(), Some(&last));
	assert_eq!(resolve_fold(&text, 14_997, 0), Some(last));
	assert_eq!(resolve_fold(&text, 14_998, 0), None);
}

#[test]
fn fold_span_serializes_in_camel_case() -> AnyEmptyResult {
	let span = resolve_fold("{% if x %}\n  a\n{% endif %}", 0, 0);
	assert_eq!(
		serde_json::to_string(&span)?,
		r#"{"fromLine":0,"fromCol":0,"toLine":2,"toCol":11}"#
	);

	Ok(())
}

// --- Completion tests ---

#[rstest]
#[case::filter("{{ foo|up", CompletionContext::Filter, 7, Some("upper"))]
#[case::test("{{ x is def", CompletionContext::Test, 8, Some("defined"))]
#[case::tag("{% ", CompletionContext::Tag, 3, Some("if"))]
#[case::tag_no_space("{%", CompletionContext::Tag, 2, Some("if"))]
#[case::set_target("{% set fo", CompletionContext::SetTarget, 7, None)]
#[case::array_functions("{{ array_f", CompletionContext::Expression, 3, Some("array_filter"))]
#[case::function("{{ x }} and {{ ran", CompletionContext::Expression, 15, Some("random"))]
#[case::pipe_in_string("{{ 'a|b' ~ ran", CompletionContext::Expression, 11, Some("random"))]
#[case::outside("hello wor", CompletionContext::None, 6, None)]
fn completions_at_cases(
	#[case] prefix: &str,
	#[case] context: CompletionContext,
	#[case] start: usize,
	#[case] first: Option<&str>,
) {
	let list = completions_at(prefix);
	assert_eq!(list.context, context);
	assert_eq!(list.start, start);
	assert_eq!(list.items.first().map(Completion::name), first);
}

#[test]
fn completions_prefer_prefix_matches() {
	let list = completions_at("{{ ran");
	let names: Vec<&str> = list.items.iter().map(Completion::name).collect();
	assert_eq!(names, vec!["random", "range"]);

	let array = completions_at("{{ array_");
	assert!(array.items.iter().all(|item| item.name().starts_with("array_")));
	assert_eq!(array.items.len(), 6);
}

#[test]
fn tag_completions_use_snippets() {
	let list = completions_at("{% ");
	let first = list.items.first().copied();
	assert_eq!(first.and_then(|item| item.snippet()), Some(SNIPPETS[0].body));
	assert!(
		list.items
			.iter()
			.any(|item| matches!(item, Completion::Keyword(entry) if entry.name == "endif"))
	);
}

#[test]
fn expand_snippet_fills_placeholders() {
	let expanded = expand_snippet(SNIPPETS[0].body, "  ");
	assert_eq!(
		expanded.text,
		"{% if condition %}\n      content\n  {% endif %}"
	);
	assert_eq!(expanded.cursor, Some((0, 6)));
}

// --- Vocabulary tests ---

#[test]
fn every_tag_completion_is_accepted() {
	for entry in TAGS.iter().chain(CLOSERS.iter()) {
		let tag = classify_statement(entry.name);
		assert!(tag.role != TagRole::Unknown, "`{}` is not classified", entry.name);
	}

	for name in TERMINAL_TAGS {
		assert!(TAGS.iter().any(|entry| entry.name == name), "`{name}` missing");
	}

	for tag in BlockTag::ALL {
		assert!(vocabulary::is_known_tag(tag.as_str()));
	}
}

#[test]
fn every_filter_completion_is_accepted() {
	for entry in FILTERS {
		let diagnostics = analyze(&format!("{{{{ x|{} }}}}", entry.name), &LintOptions::default());
		assert!(diagnostics.is_empty(), "`{}` was rejected", entry.name);
	}
}

#[test]
fn snippets_expand_to_valid_templates() {
	for snippet in SNIPPETS {
		let expanded = expand_snippet(snippet.body, "");
		let diagnostics = analyze(&expanded.text, &LintOptions::default());
		assert!(
			diagnostics.is_empty(),
			"snippet `{}` produced {:?}",
			snippet.name,
			summarize(&diagnostics)
		);
	}
}

#[test]
fn lookup_finds_names_in_several_lists() {
	let kinds: Vec<vocabulary::EntryKind> = vocabulary::lookup("date")
		.into_iter()
		.map(|(kind, _)| kind)
		.collect();
	assert_eq!(
		kinds,
		vec![
			vocabulary::EntryKind::Filter,
			vocabulary::EntryKind::Function,
			vocabulary::EntryKind::Test,
		]
	);
	assert!(vocabulary::lookup("nothing_here").is_empty());
}

// --- Config tests ---

#[test]
fn default_config_parses() -> TwigResult<()> {
	let config = TwigConfig::parse(DEFAULT_CONFIG)?;
	assert!(config.lint.operator_spacing);
	assert!(!config.lint.strict);
	assert_eq!(config.format.printer, PrinterConfig::Name("builtin".to_string()));
	assert_eq!(config.exclude.patterns, vec!["vendor/".to_string()]);

	Ok(())
}

#[test]
fn config_reads_command_printer() -> TwigResult<()> {
	let config = TwigConfig::parse(
		"[format]\nindent_width = 2\nmarkup_indent = true\nprinter = { command = \"cat\" }\n",
	)?;
	assert_eq!(
		config.format.printer,
		PrinterConfig::Command {
			command: "cat".to_string()
		}
	);

	let options = config.reflow_options();
	assert_eq!(options.printer.indent_width, 2);
	assert!(options.markup_indent);

	Ok(())
}

#[test]
fn config_use_tabs_reaches_block_indentation() -> TwigResult<()> {
	let config = TwigConfig::parse("[format]\nuse_tabs = true\n")?;
	let formatted = reformat(
		"{% if a %}\nx\n{% endif %}",
		&BuiltinPrinter,
		&config.reflow_options(),
	)?;
	assert_eq!(formatted, "{% if a %}\n\tx\n{% endif %}\n");

	Ok(())
}

#[test]
fn config_rejects_unknown_printer() -> TwigResult<()> {
	let config = TwigConfig::parse("[format]\nprinter = \"tidy\"\n")?;
	let result = config.printer(Path::new("."));
	assert!(matches!(result, Err(TwigError::ConfigParse(_))));

	Ok(())
}

#[test]
fn config_reports_invalid_toml() {
	let result = TwigConfig::parse("[lint\noperator_spacing = true");
	assert!(matches!(result, Err(TwigError::ConfigParse(_))));
}

#[test]
fn config_lint_options_follow_file() -> TwigResult<()> {
	let config = TwigConfig::parse("[lint]\noperator_spacing = false\n")?;
	assert_eq!(
		config.lint_options(),
		LintOptions {
			operator_spacing: false,
			empty_expression: true,
		}
	);

	Ok(())
}

#[test]
fn config_is_discovered_in_dot_config() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	write_file(tmp.path(), ".config/twigkit.toml", "[files]\nextensions = [\"html\"]\n");

	let config = TwigConfig::load(tmp.path())?.unwrap_or_else(|| panic!("config not found"));
	assert_eq!(config.files.extensions, vec!["html".to_string()]);
	assert!(TwigConfig::load(&tmp.path().join("missing"))?.is_none());

	Ok(())
}

#[rstest]
#[case::twig("page.twig", true)]
#[case::html_twig("page.html.twig", true)]
#[case::bare("twig", false)]
#[case::other("page.html", false)]
fn config_matches_template_extensions(#[case] name: &str, #[case] expected: bool) {
	let config = TwigConfig::default();
	assert_eq!(config.has_template_extension(Path::new(name)), expected);
}

// --- Project tests ---

#[test]
fn scan_project_collects_template_files() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(root, "a.twig", "{{ a }}\n");
	write_file(root, "sub/b.html.twig", "{{ b }}\n");
	write_file(root, "node_modules/c.twig", "{{ c }}\n");
	write_file(root, "vendor/d.twig", "{{ d }}\n");
	write_file(root, ".cache/e.twig", "{{ e }}\n");
	write_file(root, "ignored.twig", "{{ f }}\n");
	write_file(root, "notes.txt", "{{ g }}\n");
	write_file(root, ".gitignore", "ignored.twig\n");

	let ctx = scan_project(root)?;
	assert_eq!(ctx.files, vec![root.join("a.twig"), root.join("sub/b.html.twig")]);

	Ok(())
}

#[test]
fn scan_project_applies_exclude_and_include_patterns() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(
		root,
		"twigkit.toml",
		"[exclude]\npatterns = [\"generated/\"]\n\n[include]\npatterns = [\"legacy/*.html\"]\n",
	);
	write_file(root, "generated/x.twig", "{{ x }}\n");
	write_file(root, "legacy/page.html", "{{ y }}\n");
	write_file(root, "main.twig", "{{ z }}\n");

	let ctx = scan_project(root)?;
	assert_eq!(
		ctx.files,
		vec![root.join("legacy/page.html"), root.join("main.twig")]
	);

	Ok(())
}

#[test]
fn scan_project_respects_disabled_gitignore() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(root, "twigkit.toml", "disable_gitignore = true\n");
	write_file(root, ".gitignore", "ignored.twig\n");
	write_file(root, "ignored.twig", "{{ f }}\n");

	let ctx = scan_project(root)?;
	assert_eq!(ctx.files, vec![root.join("ignored.twig")]);

	Ok(())
}

#[test]
fn check_project_reports_per_file() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(root, "a.twig", "{% if x %}\n");
	write_file(root, "b.twig", "{{ a==b }}\n");
	write_file(root, "c.twig", "{{ fine }}\n");

	let result = check_project(&scan_project(root)?)?;
	assert_eq!(result.files.len(), 3);
	assert_eq!(result.error_count(), 1);
	assert_eq!(result.warning_count(), 1);
	assert_eq!(result.with_diagnostics().count(), 2);
	assert!(!result.is_ok(false));

	let lenient = check_project(&scan_project(root)?.with_files(vec![root.join("b.twig")]))?;
	assert!(lenient.is_ok(false));
	assert!(!lenient.is_ok(true));

	Ok(())
}

#[test]
fn check_project_enforces_max_file_size() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(root, "twigkit.toml", "[files]\nmax_file_size = 10\n");
	write_file(root, "big.twig", "{{ a }} {{ b }} {{ c }} {{ d }}\n");

	let result = check_project(&scan_project(root)?);
	assert!(matches!(result, Err(TwigError::FileTooLarge { limit: 10, .. })));

	Ok(())
}

#[test]
fn compute_and_write_formatting() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(root, "a.twig", "{% if x %}\n{{ y }}\n{% endif %}\n");
	write_file(root, "b.twig", "{{ a }}\n");

	let ctx = scan_project(root)?;
	let result = compute_formatting(&ctx)?;
	assert_eq!(result.updates.len(), 1);
	assert_eq!(result.unchanged, 1);

	let update = &result.updates[0];
	assert_eq!(update.formatted, "{% if x %}\n    {{ y }}\n{% endif %}\n");
	let diff = update.diff();
	assert!(diff.contains("-{{ y }}"));
	assert!(diff.contains("+    {{ y }}"));

	write_updates(&result)?;
	assert_eq!(
		std::fs::read_to_string(root.join("a.twig"))?,
		"{% if x %}\n    {{ y }}\n{% endif %}\n"
	);
	assert!(compute_formatting(&ctx)?.is_clean());

	Ok(())
}

#[cfg(unix)]
#[test]
fn collect_files_detects_symlink_cycles() -> TwigResult<()> {
	let tmp = tempfile::tempdir()?;
	let root = tmp.path();
	write_file(root, "inner/a.twig", "{{ a }}\n");
	std::os::unix::fs::symlink(root.join("inner"), root.join("inner/loop"))?;

	let result = collect_files(root, &ScanOptions::default());
	assert!(matches!(result, Err(TwigError::SymlinkCycle { .. })));

	Ok(())
}

#[test]
fn normalize_line_endings_converts_crlf() {
	assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
}
