use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use serde::Serialize;
use similar::TextDiff;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::Diagnostics;
use crate::TwigConfig;
use crate::TwigError;
use crate::TwigResult;
use crate::config::CONFIG_FILE_CANDIDATES;
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::reformat;
use crate::validator::analyze;

/// Options for controlling which files a project scan picks up.
///
/// Use [`ScanOptions::default()`] for sensible defaults or
/// [`ScanOptions::from_config`] to construct from a [`TwigConfig`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
	/// Gitignore-style patterns to exclude from scanning.
	pub exclude_patterns: Vec<String>,
	/// Files matching these globs are scanned whatever their extension.
	pub include_set: GlobSet,
	/// File name suffixes to scan, without the leading dot.
	pub extensions: Vec<String>,
	/// Maximum file size to scan in bytes.
	pub max_file_size: u64,
	/// Whether to disable `.gitignore` integration.
	pub disable_gitignore: bool,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			exclude_patterns: Vec::new(),
			include_set: GlobSet::empty(),
			extensions: vec!["twig".to_string()],
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
		}
	}
}

impl ScanOptions {
	pub fn from_config(config: &TwigConfig) -> Self {
		Self {
			exclude_patterns: config.exclude.patterns.clone(),
			include_set: build_glob_set(&config.include.patterns),
			extensions: config.files.extensions.clone(),
			max_file_size: config.files.max_file_size,
			disable_gitignore: config.disable_gitignore,
		}
	}

	fn wants(&self, root: &Path, path: &Path) -> bool {
		let by_extension = path
			.file_name()
			.and_then(|name| name.to_str())
			.is_some_and(|name| {
				self.extensions.iter().any(|extension| {
					let suffix = format!(".{}", extension.trim_start_matches('.'));
					name.len() > suffix.len() && name.ends_with(&suffix)
				})
			});

		by_extension
			|| path
				.strip_prefix(root)
				.is_ok_and(|relative| self.include_set.is_match(relative))
	}
}

/// A project root with its configuration and the template files found in
/// it.
#[derive(Debug, Clone)]
pub struct ProjectContext {
	pub root: PathBuf,
	/// The loaded `twigkit.toml`, or defaults when there is none.
	pub config: TwigConfig,
	pub files: Vec<PathBuf>,
}

impl ProjectContext {
	/// Restrict the context to explicitly named files.
	#[must_use]
	pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
		self.files = files;
		self
	}
}

/// Load the config at `root` and collect every template file under it.
#[instrument(level = "debug", skip_all, fields(root = %root.display()))]
pub fn scan_project(root: &Path) -> TwigResult<ProjectContext> {
	let config = TwigConfig::load(root)?.unwrap_or_default();
	let options = ScanOptions::from_config(&config);
	let files = collect_files(root, &options)?;
	debug!(files = files.len(), "collected template files");

	Ok(ProjectContext {
		root: root.to_path_buf(),
		config,
		files,
	})
}

/// The diagnostics of one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
	pub path: PathBuf,
	pub diagnostics: Diagnostics,
}

/// Result of checking a set of files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResult {
	/// Every checked file, including those without diagnostics.
	pub files: Vec<FileReport>,
}

impl CheckResult {
	/// Returns true if no file has an error. Style diagnostics count as
	/// errors when `strict` is set.
	pub fn is_ok(&self, strict: bool) -> bool {
		self.error_count() == 0 && (!strict || self.warning_count() == 0)
	}

	pub fn error_count(&self) -> usize {
		self.files
			.iter()
			.map(|file| file.diagnostics.error_count())
			.sum()
	}

	pub fn warning_count(&self) -> usize {
		self.files
			.iter()
			.map(|file| file.diagnostics.warning_count())
			.sum()
	}

	/// Files with at least one diagnostic.
	pub fn with_diagnostics(&self) -> impl Iterator<Item = &FileReport> {
		self.files
			.iter()
			.filter(|file| !file.diagnostics.is_empty())
	}
}

/// Analyse every file in the project.
pub fn check_project(ctx: &ProjectContext) -> TwigResult<CheckResult> {
	let options = ctx.config.lint_options();
	let mut files = Vec::with_capacity(ctx.files.len());

	for path in &ctx.files {
		let Some(content) = read_template(path, ctx.config.files.max_file_size)? else {
			continue;
		};

		files.push(FileReport {
			path: path.clone(),
			diagnostics: analyze(&content, &options),
		});
	}

	Ok(CheckResult { files })
}

/// A file whose formatted text differs from what is on disk.
#[derive(Debug, Clone)]
pub struct FileUpdate {
	pub path: PathBuf,
	pub original: String,
	pub formatted: String,
}

impl FileUpdate {
	/// A unified diff from the original to the formatted text.
	pub fn diff(&self) -> String {
		let name = self.path.display().to_string();
		TextDiff::from_lines(&self.original, &self.formatted)
			.unified_diff()
			.context_radius(3)
			.header(&name, &name)
			.to_string()
	}
}

/// Result of formatting a project.
#[derive(Debug, Clone, Default)]
pub struct FormatResult {
	pub updates: Vec<FileUpdate>,
	/// Number of files that were already formatted.
	pub unchanged: usize,
}

impl FormatResult {
	pub fn is_clean(&self) -> bool {
		self.updates.is_empty()
	}
}

/// Reformat every file in the project without writing anything.
#[instrument(level = "debug", skip_all)]
pub fn compute_formatting(ctx: &ProjectContext) -> TwigResult<FormatResult> {
	let printer = ctx.config.printer(&ctx.root)?;
	let options = ctx.config.reflow_options();
	let mut result = FormatResult::default();

	for path in &ctx.files {
		let Some(original) = read_template(path, ctx.config.files.max_file_size)? else {
			continue;
		};

		let formatted = reformat(&normalize_line_endings(&original), printer.as_ref(), &options)?;

		if formatted == original {
			result.unchanged += 1;
		} else {
			result.updates.push(FileUpdate {
				path: path.clone(),
				original,
				formatted,
			});
		}
	}

	debug!(
		changed = result.updates.len(),
		unchanged = result.unchanged,
		"computed formatting"
	);

	Ok(result)
}

/// Write every computed update to disk.
pub fn write_updates(result: &FormatResult) -> TwigResult<()> {
	for update in &result.updates {
		std::fs::write(&update.path, &update.formatted)?;
	}
	Ok(())
}

/// Normalize CRLF line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}

/// Read a template file. Files that are not valid UTF-8 are skipped with a
/// warning.
fn read_template(path: &Path, max_file_size: u64) -> TwigResult<Option<String>> {
	let size = std::fs::metadata(path)?.len();
	if size > max_file_size {
		return Err(TwigError::FileTooLarge {
			path: path.display().to_string(),
			size,
			limit: max_file_size,
		});
	}

	match std::fs::read_to_string(path) {
		Ok(content) => Ok(Some(content)),
		Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
			warn!(path = %path.display(), "skipping file that is not valid UTF-8");
			Ok(None)
		}
		Err(e) => Err(e.into()),
	}
}

/// Build a `GlobSet` from a list of glob pattern strings.
fn build_glob_set(patterns: &[String]) -> GlobSet {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		match Glob::new(pattern) {
			Ok(glob) => {
				builder.add(glob);
			}
			Err(e) => warn!(pattern, error = %e, "ignoring invalid include pattern"),
		}
	}
	builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Build a `Gitignore` matcher from the `[exclude]` patterns. These follow
/// `.gitignore` syntax and are applied on top of any `.gitignore` rules.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> TwigResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			TwigError::InvalidExcludePattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
	}
	builder.build().map_err(|e| {
		TwigError::InvalidExcludePattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		let _ = builder.add(gitignore_path);
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Collect every template file under `root`, sorted.
///
/// When `disable_gitignore` is false (the default), files matched by the
/// project's `.gitignore` are skipped. Exclude patterns always apply on top.
pub fn collect_files(root: &Path, options: &ScanOptions) -> TwigResult<Vec<PathBuf>> {
	let mut walker = Walker {
		root,
		options,
		gitignore: if options.disable_gitignore {
			Gitignore::empty()
		} else {
			build_gitignore(root)
		},
		exclude: build_exclude_matcher(root, &options.exclude_patterns)?,
		visited_dirs: HashSet::new(),
		files: Vec::new(),
	};

	walker.walk(root, true)?;
	let mut files = walker.files;
	files.sort();
	Ok(files)
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || matches!(name, "node_modules" | "vendor" | "target")
}

fn has_project_config(dir: &Path) -> bool {
	CONFIG_FILE_CANDIDATES
		.iter()
		.any(|candidate| dir.join(candidate).is_file())
}

struct Walker<'a> {
	root: &'a Path,
	options: &'a ScanOptions,
	gitignore: Gitignore,
	exclude: Gitignore,
	visited_dirs: HashSet<PathBuf>,
	files: Vec<PathBuf>,
}

impl Walker<'_> {
	fn walk(&mut self, dir: &Path, is_root: bool) -> TwigResult<()> {
		if !dir.is_dir() {
			return Ok(());
		}

		// Canonical paths catch symlinks that loop back up the tree.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !self.visited_dirs.insert(canonical) {
			return Err(TwigError::SymlinkCycle {
				path: dir.display().to_string(),
			});
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();
			let is_dir = path.is_dir();

			if is_dir
				&& path
					.file_name()
					.and_then(|name| name.to_str())
					.is_some_and(is_ignored_directory_name)
			{
				continue;
			}

			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				// Nested projects are checked on their own.
				if !is_root && has_project_config(&path) {
					continue;
				}
				self.walk(&path, false)?;
			} else if self.options.wants(self.root, &path) {
				self.files.push(path);
			}
		}

		Ok(())
	}
}
