use std::collections::HashMap;
use std::hash::Hash;

use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::BlockTag;
use crate::RegionKind;
use crate::classifier::NestingEvent;
use crate::classifier::nesting_events;
use crate::markup::MarkupTag;
use crate::markup::MarkupTagKind;
use crate::markup::markup_tags;
use crate::markup::markup_tags_by_line;
use crate::scanner::scan_line;
use crate::vocabulary::FOLD_PAIRS;

/// A foldable range. Lines and columns are 0-indexed; `to_col` is the
/// character length of the closing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldSpan {
	pub from_line: usize,
	pub from_col: usize,
	pub to_line: usize,
	pub to_col: usize,
}

impl FoldSpan {
	fn new(from_line: usize, to_line: usize, closing_line: &str) -> Self {
		Self {
			from_line,
			from_col: 0,
			to_line,
			to_col: closing_line.chars().count(),
		}
	}
}

/// What the block and pair matchers need from one line.
struct LineFacts {
	events: Vec<NestingEvent>,
	/// The line lowercased, with template regions blanked.
	masked: String,
}

impl LineFacts {
	fn new(line: &str) -> Self {
		let regions = scan_line(line, 1);
		let events = nesting_events(&regions);
		let masked = regions
			.iter()
			.map(|region| {
				if region.kind == RegionKind::Text {
					region.raw.to_ascii_lowercase()
				} else {
					" ".repeat(region.raw.chars().count())
				}
			})
			.collect();

		Self { events, masked }
	}
}

/// Net opens of `tag` among `events`.
fn block_balance(events: &[NestingEvent], tag: BlockTag) -> isize {
	events
		.iter()
		.map(|event| {
			match event {
				NestingEvent::Open(open) if *open == tag => 1,
				NestingEvent::Close(close) if *close == tag => -1,
				_ => 0,
			}
		})
		.sum()
}

/// The first block the line opens and leaves open, with how many of it
/// stay open.
fn block_opener(events: &[NestingEvent]) -> Option<(BlockTag, isize)> {
	events.iter().find_map(|event| {
		let NestingEvent::Open(tag) = event else {
			return None;
		};
		let balance = block_balance(events, *tag);
		(balance > 0).then_some((*tag, balance))
	})
}

/// The first element the line opens and leaves open. A line holding a
/// self-closing tag never starts an element fold.
fn element_opener(tags: &[MarkupTag]) -> Option<(&str, isize)> {
	if tags.iter().any(|tag| tag.kind == MarkupTagKind::SelfClosing) {
		return None;
	}

	tags.iter().find_map(|tag| {
		if tag.kind != MarkupTagKind::Open {
			return None;
		}
		let balance = tags
			.iter()
			.filter(|other| other.name == tag.name)
			.map(MarkupTag::depth_delta)
			.sum::<isize>();
		(balance > 0).then_some((tag.name.as_str(), balance))
	})
}

/// The closer of the first fixed pair the line opens without closing.
fn pair_closer(masked: &str) -> Option<&'static str> {
	FOLD_PAIRS
		.iter()
		.find(|(opener, closer)| masked.contains(opener) && !masked.contains(closer))
		.map(|(_, closer)| *closer)
}

/// Resolve the fold span that starts on the 0-indexed `line`. The column is
/// accepted for protocol compatibility and does not affect the result.
///
/// Only the query line and the lines up to its match are read.
pub fn resolve_fold(text: &str, line: usize, _column: usize) -> Option<FoldSpan> {
	let start = if line == 0 {
		0
	} else {
		text.match_indices('\n').nth(line - 1)?.0 + 1
	};
	let rest = &text[start..];
	rest.lines().next()?;

	let offset = match_block(rest)
		.or_else(|| match_element(rest))
		.or_else(|| match_pair(rest))?;
	let closing = rest.lines().nth(offset)?;

	Some(FoldSpan::new(line, line + offset, closing))
}

/// Line offset in `rest` of the closer matching the block opened on its
/// first line.
fn match_block(rest: &str) -> Option<usize> {
	let mut lines = rest.lines().enumerate();
	let (_, first) = lines.next()?;
	let (tag, mut depth) = block_opener(&LineFacts::new(first).events)?;

	for (offset, line) in lines {
		for event in LineFacts::new(line).events {
			match event {
				NestingEvent::Open(open) if open == tag => depth += 1,
				NestingEvent::Close(close) if close == tag => depth -= 1,
				_ => {}
			}

			if depth == 0 {
				trace!(offset, %tag, "block fold");
				return Some(offset);
			}
		}
	}

	None
}

/// Line offset in `rest` of the closing tag matching the element opened on
/// its first line.
fn match_element(rest: &str) -> Option<usize> {
	let mut tags = markup_tags(rest).peekable();
	let mut first = vec![];
	while let Some(tag) = tags.next_if(|tag| tag.line == 0) {
		first.push(tag);
	}

	let (name, mut depth) = element_opener(&first)?;

	for tag in tags.filter(|tag| tag.name == name) {
		depth += tag.depth_delta();

		if depth == 0 {
			trace!(offset = tag.line, name, "element fold");
			return Some(tag.line);
		}
	}

	None
}

/// Line offset in `rest` of the first later line holding the closer of the
/// fixed pair opened on its first line.
fn match_pair(rest: &str) -> Option<usize> {
	let mut lines = rest.lines().enumerate();
	let (_, first) = lines.next()?;
	let closer = pair_closer(&LineFacts::new(first).masked)?;

	let (offset, _) = lines.find(|(_, line)| LineFacts::new(line).masked.contains(closer))?;
	trace!(offset, closer, "pair fold");
	Some(offset)
}

/// Running depth per key for matching openers in one forward pass. A line
/// that leaves `key` open waits until the depth of `key` falls back to what
/// it was before that line.
struct DepthTracker<K> {
	depths: HashMap<K, isize>,
	/// Waiting `(depth, line)` pairs per key. Depths strictly increase
	/// towards the top.
	waiting: HashMap<K, Vec<(isize, usize)>>,
}

impl<K: Eq + Hash + Clone> DepthTracker<K> {
	fn new() -> Self {
		Self {
			depths: HashMap::new(),
			waiting: HashMap::new(),
		}
	}

	fn depth(&self, key: &K) -> isize {
		self.depths.get(key).copied().unwrap_or_default()
	}

	/// Apply `delta` to `key` on `line`, ending the innermost waiting line
	/// whose depth is reached.
	fn step(&mut self, key: &K, delta: isize, line: usize, ends: &mut [Option<usize>]) {
		if delta == 0 {
			return;
		}

		let depth = match self.depths.get_mut(key) {
			Some(depth) => {
				*depth += delta;
				*depth
			}
			None => {
				self.depths.insert(key.clone(), delta);
				delta
			}
		};

		if delta > 0 {
			return;
		}

		let Some(waiting) = self.waiting.get_mut(key) else {
			return;
		};

		if waiting.last().is_some_and(|(target, _)| *target == depth) {
			if let Some((_, from)) = waiting.pop() {
				ends[from] = Some(line);
			}
		}
	}

	fn wait(&mut self, key: K, depth: isize, line: usize) {
		self.waiting.entry(key).or_default().push((depth, line));
	}
}

fn block_ends(facts: &[LineFacts]) -> Vec<Option<usize>> {
	let mut ends = vec![None; facts.len()];
	let mut tracker = DepthTracker::new();

	for (line, fact) in facts.iter().enumerate() {
		let opener = block_opener(&fact.events).map(|(tag, _)| (tag, tracker.depth(&tag)));

		for event in &fact.events {
			match event {
				NestingEvent::Open(tag) => tracker.step(tag, 1, line, &mut ends),
				NestingEvent::Close(tag) => tracker.step(tag, -1, line, &mut ends),
				NestingEvent::Branch => {}
			}
		}

		if let Some((tag, depth)) = opener {
			tracker.wait(tag, depth, line);
		}
	}

	ends
}

fn element_ends(tags: &[Vec<MarkupTag>]) -> Vec<Option<usize>> {
	let mut ends = vec![None; tags.len()];
	let mut tracker: DepthTracker<String> = DepthTracker::new();

	for (line, line_tags) in tags.iter().enumerate() {
		let opener = element_opener(line_tags).map(|(name, _)| {
			let name = name.to_string();
			let depth = tracker.depth(&name);
			(name, depth)
		});

		for tag in line_tags {
			tracker.step(&tag.name, tag.depth_delta(), line, &mut ends);
		}

		if let Some((name, depth)) = opener {
			tracker.wait(name, depth, line);
		}
	}

	ends
}

fn pair_ends(facts: &[LineFacts]) -> Vec<Option<usize>> {
	let mut ends = vec![None; facts.len()];
	let mut waiting: HashMap<&str, Vec<usize>> = HashMap::new();

	for (line, fact) in facts.iter().enumerate() {
		for (_, closer) in FOLD_PAIRS {
			if !fact.masked.contains(closer) {
				continue;
			}
			for from in waiting.remove(closer).unwrap_or_default() {
				ends[from] = Some(line);
			}
		}

		if let Some(closer) = pair_closer(&fact.masked) {
			waiting.entry(closer).or_default().push(line);
		}
	}

	ends
}

/// Every fold span in the document, in line order, computed in one forward
/// pass. Gives the same span as [`resolve_fold`] for every line that does
/// not sit inside a multi-line comment or template region.
pub fn fold_ranges(text: &str) -> Vec<FoldSpan> {
	let lines: Vec<&str> = text.lines().collect();
	let facts: Vec<LineFacts> = lines.iter().map(|line| LineFacts::new(line)).collect();
	let tags = markup_tags_by_line(text, lines.len());

	let blocks = block_ends(&facts);
	let elements = element_ends(&tags);
	let pairs = pair_ends(&facts);

	let spans: Vec<FoldSpan> = (0..lines.len())
		.filter_map(|line| {
			let to = blocks[line].or(elements[line]).or(pairs[line])?;
			Some(FoldSpan::new(line, to, lines[to]))
		})
		.collect();
	trace!(lines = lines.len(), spans = spans.len(), "fold ranges");

	spans
}
