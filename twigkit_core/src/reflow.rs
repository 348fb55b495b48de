use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use tracing::debug;
use tracing::instrument;

use crate::Region;
use crate::TwigError;
use crate::TwigResult;
use crate::classifier::NestingEvent;
use crate::classifier::nesting_events;
use crate::markup::MarkupTag;
use crate::markup::markup_tags_by_line;
use crate::scanner::normalize_delimiter_spacing;
use crate::scanner::scan_document;

/// The layout the markup printer is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterOptions {
	pub indent_width: usize,
	pub use_tabs: bool,
	/// The longest run of blank lines kept.
	pub max_preserve_newlines: usize,
	pub reorder_attributes: bool,
	pub collapse_braces: bool,
	pub end_with_newline: bool,
}

impl PrinterOptions {
	/// The text one indentation level adds: a tab, or `indent_width` spaces.
	pub fn indent_unit(&self) -> String {
		if self.use_tabs {
			"\t".to_string()
		} else {
			" ".repeat(self.indent_width)
		}
	}
}

impl Default for PrinterOptions {
	fn default() -> Self {
		Self {
			indent_width: 4,
			use_tabs: false,
			max_preserve_newlines: 2,
			reorder_attributes: false,
			collapse_braces: true,
			end_with_newline: true,
		}
	}
}

/// Reformats markup that contains no template regions.
///
/// Implementations receive text where each template region has been replaced
/// by an opaque word and must return every such word unchanged.
pub trait MarkupPrinter {
	fn print(&self, markup: &str, options: &PrinterOptions) -> TwigResult<String>;
}

/// Line-preserving markup indenter. Lines are trimmed, blank runs are
/// capped, and each line is indented by the element depth it starts at.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrinter;

impl MarkupPrinter for BuiltinPrinter {
	fn print(&self, markup: &str, options: &PrinterOptions) -> TwigResult<String> {
		let lines: Vec<&str> = markup.lines().collect();
		let tags = markup_tags_by_line(markup, lines.len());
		let unit = options.indent_unit();

		let mut output: Vec<String> = vec![];
		let mut depth = 0usize;
		let mut blank_run = 0usize;

		for (line, line_tags) in lines.iter().zip(&tags) {
			let trimmed = line.trim();

			if trimmed.is_empty() {
				blank_run += 1;
				if !output.is_empty() && blank_run <= options.max_preserve_newlines {
					output.push(String::new());
				}
				continue;
			}
			blank_run = 0;

			let (dedent, net) = depth_change(line_tags.iter().map(MarkupTag::depth_delta));
			let line_depth = depth.saturating_sub(dedent);
			depth = line_depth + net;

			output.push(format!("{}{trimmed}", unit.repeat(line_depth)));
		}

		while output.last().is_some_and(String::is_empty) {
			output.pop();
		}

		let mut printed = output.join("\n");
		if options.end_with_newline && !printed.is_empty() {
			printed.push('\n');
		}

		Ok(printed)
	}
}

/// Runs a shell command with the markup on stdin and reads the result from
/// stdout.
#[derive(Debug, Clone)]
pub struct CommandPrinter {
	pub command: String,
	pub working_dir: Option<PathBuf>,
}

impl CommandPrinter {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			working_dir: None,
		}
	}

	#[must_use]
	pub fn with_working_dir(mut self, dir: &Path) -> Self {
		self.working_dir = Some(dir.to_path_buf());
		self
	}

	fn failure(&self, reason: impl Into<String>) -> TwigError {
		TwigError::PrinterCommand {
			command: self.command.clone(),
			reason: reason.into(),
		}
	}
}

impl MarkupPrinter for CommandPrinter {
	fn print(&self, markup: &str, _options: &PrinterOptions) -> TwigResult<String> {
		if self.command.trim().is_empty() {
			return Err(TwigError::Printer("no printer command configured".to_string()));
		}

		let mut command = if cfg!(windows) {
			let mut command = Command::new("cmd");
			command.arg("/C").arg(&self.command);
			command
		} else {
			let mut command = Command::new("sh");
			command.arg("-c").arg(&self.command);
			command
		};

		if let Some(dir) = &self.working_dir {
			command.current_dir(dir);
		}

		let mut child = command
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| self.failure(e.to_string()))?;

		let writer = child.stdin.take().map(|mut stdin| {
			let input = markup.to_string();
			std::thread::spawn(move || stdin.write_all(input.as_bytes()))
		});

		let output = child.wait_with_output()?;

		if let Some(writer) = writer {
			match writer.join() {
				Ok(Ok(())) => {}
				Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
				Ok(Err(e)) => return Err(self.failure(e.to_string())),
				Err(_) => return Err(self.failure("stdin writer panicked")),
			}
		}

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			let reason = if stderr.is_empty() {
				format!(
					"command exited with status {}",
					output
						.status
						.code()
						.map_or_else(|| "unknown".to_string(), |code| code.to_string())
				)
			} else {
				stderr
			};

			return Err(self.failure(reason));
		}

		String::from_utf8(output.stdout)
			.map_err(|_| TwigError::Printer("printer output is not valid UTF-8".to_string()))
	}
}

/// Settings for [`reformat`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflowOptions {
	pub printer: PrinterOptions,
	/// Keep the printer's markup indentation and add the block indentation
	/// on top. When false each line is indented by block depth only.
	pub markup_indent: bool,
}

/// A document with its template regions swapped for placeholder words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
	pub text: String,
	/// The normalized region text for each placeholder, by index.
	pub regions: Vec<String>,
	tag: String,
}

impl ProtectedText {
	pub fn placeholder(&self, index: usize) -> String {
		format!("__{}_{index}__", self.tag)
	}

	/// Substitute every placeholder back. Each must appear exactly once.
	pub fn restore(&self, printed: &str) -> TwigResult<String> {
		let prefix = format!("__{}_", self.tag);
		let mut seen = vec![false; self.regions.len()];
		let mut restored = String::with_capacity(printed.len());
		let mut rest = printed;

		while let Some(found) = rest.find(&prefix) {
			restored.push_str(&rest[..found]);
			let after = &rest[found + prefix.len()..];
			let digits = after.bytes().take_while(u8::is_ascii_digit).count();
			let index = after[..digits].parse::<usize>().ok();
			let closed = after[digits..].starts_with("__");

			match index {
				Some(index) if closed && index < self.regions.len() && !seen[index] => {
					seen[index] = true;
					restored.push_str(&self.regions[index]);
					rest = &after[digits + 2..];
				}
				_ => {
					restored.push_str(&prefix);
					rest = after;
				}
			}
		}

		restored.push_str(rest);

		if let Some(missing) = seen.iter().position(|found| !found) {
			return Err(TwigError::PlaceholderLost(self.placeholder(missing)));
		}

		Ok(restored)
	}
}

/// Replace every terminated template region with a placeholder word. Region
/// text is delimiter-spacing normalized first. Unterminated regions stay in
/// place as ordinary text.
pub fn protect(text: &str) -> ProtectedText {
	let mut tag = String::from("TWIGKIT");
	while text.contains(&tag) {
		tag.push('X');
	}

	let mut protected = ProtectedText {
		text: String::with_capacity(text.len()),
		regions: vec![],
		tag,
	};

	for region in scan_document(text) {
		if region.kind.is_template() {
			let placeholder = protected.placeholder(protected.regions.len());
			protected.text.push_str(&placeholder);
			protected
				.regions
				.push(normalize_delimiter_spacing(&region.raw));
		} else {
			protected.text.push_str(&region.raw);
		}
	}

	protected
}

/// Split a run of depth changes into the dedent applied before the line and
/// the net change applied after it.
fn depth_change(deltas: impl IntoIterator<Item = isize>) -> (usize, usize) {
	let mut running = 0isize;
	let mut lowest = 0isize;

	for delta in deltas {
		running += delta;
		lowest = lowest.min(running);
	}

	(lowest.unsigned_abs(), (running - lowest).unsigned_abs())
}

/// Re-indent `text` from block depth, adding `unit` once per open block.
/// Lines inside a multi-line template region keep their text.
pub fn reindent(text: &str, unit: &str, markup_indent: bool) -> String {
	let lines: Vec<&str> = text.split('\n').collect();
	let mut starts: Vec<Vec<&Region>> = vec![Vec::new(); lines.len()];
	let mut continuation = vec![false; lines.len()];
	let regions: Vec<Region> = scan_document(text)
		.into_iter()
		.filter(|region| region.kind.is_template())
		.collect();

	for region in &regions {
		if let Some(bucket) = starts.get_mut(region.line() - 1) {
			bucket.push(region);
		}

		for line in region.position.start.line..region.position.end.line {
			if let Some(flag) = continuation.get_mut(line) {
				*flag = true;
			}
		}
	}

	let mut level = 0usize;
	let mut output = Vec::with_capacity(lines.len());

	for (index, line) in lines.iter().enumerate() {
		if continuation[index] {
			output.push((*line).to_string());
			continue;
		}

		let mut deltas = vec![];
		for event in nesting_events(starts[index].iter().copied()) {
			match event {
				NestingEvent::Open(_) => deltas.push(1),
				NestingEvent::Close(_) => deltas.push(-1),
				NestingEvent::Branch => deltas.extend([-1, 1]),
			}
		}

		let (dedent, net) = depth_change(deltas);
		let line_level = level.saturating_sub(dedent);
		level = line_level + net;

		if line.trim().is_empty() {
			output.push(String::new());
			continue;
		}

		let content = if markup_indent {
			line.trim_end()
		} else {
			line.trim()
		};
		output.push(format!("{}{content}", unit.repeat(line_level)));
	}

	output.join("\n")
}

/// Reformat a template document.
///
/// Template regions are protected, the remaining markup goes through
/// `printer`, regions are restored and every line is re-indented by block
/// depth. Any printer failure aborts the whole operation and the input is
/// never modified.
#[instrument(level = "debug", skip_all, fields(bytes = text.len()))]
pub fn reformat(
	text: &str,
	printer: &dyn MarkupPrinter,
	options: &ReflowOptions,
) -> TwigResult<String> {
	let protected = protect(text);
	debug!(regions = protected.regions.len(), "protected template regions");

	let printed = printer.print(&protected.text, &options.printer)?;
	let restored = protected.restore(&printed)?;

	Ok(reindent(
		&restored,
		&options.printer.indent_unit(),
		options.markup_indent,
	))
}
