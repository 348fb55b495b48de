use std::path::Path;

use crate::MarkupPrinter;
use crate::PrinterOptions;
use crate::TwigError;
use crate::TwigResult;

pub const LIST_PAGE: &str = "{% extends 'base.twig' %}
{% block content %}
<ul>
{% for item in items %}
<li>{{   item.name|upper   }}</li>
{% else %}
<li>none</li>
{% endfor %}
</ul>
{% endblock %}
";

pub const NESTED_BLOCKS: &str = "{% if a %}
{% if b %}
x
{% endif %}
{% endif %}";

pub const MULTI_LINE_OUTPUT: &str = "{% if x %}
{{ foo(
  a,
  b) }}
{% endif %}
";

/// Returns the markup unchanged.
pub struct EchoPrinter;

impl MarkupPrinter for EchoPrinter {
	fn print(&self, markup: &str, _options: &PrinterOptions) -> TwigResult<String> {
		Ok(markup.to_string())
	}
}

/// Loses every placeholder.
pub struct DroppingPrinter;

impl MarkupPrinter for DroppingPrinter {
	fn print(&self, _markup: &str, _options: &PrinterOptions) -> TwigResult<String> {
		Ok("<div></div>\n".to_string())
	}
}

/// Always fails.
pub struct FailingPrinter;

impl MarkupPrinter for FailingPrinter {
	fn print(&self, _markup: &str, _options: &PrinterOptions) -> TwigResult<String> {
		Err(TwigError::Printer("unbalanced markup".to_string()))
	}
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
	}
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {relative}: {e}"));
}
