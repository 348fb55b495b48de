use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::LintOptions;
use crate::TwigError;
use crate::TwigResult;
use crate::reflow::BuiltinPrinter;
use crate::reflow::CommandPrinter;
use crate::reflow::MarkupPrinter;
use crate::reflow::PrinterOptions;
use crate::reflow::ReflowOptions;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["twigkit.toml", ".twigkit.toml", ".config/twigkit.toml"];

/// The file written by `twigkit init`.
pub const DEFAULT_CONFIG: &str = r#"[lint]
# Report binary operators written without surrounding spaces.
operator_spacing = true
# Report `{{ }}` with nothing inside.
empty_expression = true
# Treat style diagnostics as failures.
strict = false

[format]
indent_width = 4
# "builtin" or { command = "prettier --parser html" }
printer = "builtin"

[files]
extensions = ["twig"]

[exclude]
patterns = ["vendor/"]
"#;

/// Configuration loaded from a `twigkit.toml` file.
///
/// ```toml
/// [lint]
/// operator_spacing = true
/// empty_expression = true
/// strict = false
///
/// [format]
/// indent_width = 4
/// use_tabs = false
/// max_preserve_newlines = 2
/// markup_indent = false
/// printer = { command = "prettier --parser html" }
///
/// [files]
/// extensions = ["twig", "html.twig"]
/// max_file_size = 10485760
///
/// [exclude]
/// patterns = ["vendor/", "*.min.twig"]
///
/// [include]
/// patterns = ["legacy/**/*.html"]
///
/// disable_gitignore = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwigConfig {
	#[serde(default)]
	pub lint: LintConfig,
	#[serde(default)]
	pub format: FormatConfig,
	#[serde(default)]
	pub files: FilesConfig,
	/// Gitignore-style patterns for files and directories to skip.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Extra glob patterns for files to check regardless of extension.
	#[serde(default)]
	pub include: IncludeConfig,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LintConfig {
	#[serde(default = "enabled")]
	pub operator_spacing: bool,
	#[serde(default = "enabled")]
	pub empty_expression: bool,
	/// Style diagnostics fail `twigkit check` when set.
	#[serde(default)]
	pub strict: bool,
}

impl Default for LintConfig {
	fn default() -> Self {
		Self {
			operator_spacing: true,
			empty_expression: true,
			strict: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatConfig {
	#[serde(default = "default_indent_width")]
	pub indent_width: usize,
	#[serde(default)]
	pub use_tabs: bool,
	#[serde(default = "default_max_preserve_newlines")]
	pub max_preserve_newlines: usize,
	/// Keep markup indentation under the block indentation.
	#[serde(default)]
	pub markup_indent: bool,
	#[serde(default)]
	pub printer: PrinterConfig,
}

impl Default for FormatConfig {
	fn default() -> Self {
		Self {
			indent_width: default_indent_width(),
			use_tabs: false,
			max_preserve_newlines: default_max_preserve_newlines(),
			markup_indent: false,
			printer: PrinterConfig::default(),
		}
	}
}

/// The markup printer used by `format`.
///
/// ```toml
/// [format]
/// printer = "builtin"
/// ```
///
/// ```toml
/// [format]
/// printer = { command = "prettier --parser html" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum PrinterConfig {
	Name(String),
	Command { command: String },
}

impl Default for PrinterConfig {
	fn default() -> Self {
		Self::Name("builtin".to_string())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
	/// File name suffixes checked, without the leading dot.
	#[serde(default = "default_extensions")]
	pub extensions: Vec<String>,
	/// Files larger than this fail the scan. Defaults to 10 MB.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
}

impl Default for FilesConfig {
	fn default() -> Self {
		Self {
			extensions: default_extensions(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Examples: `"build/"`, `"*.min.twig"`, `"!keep.twig"`.
	#[serde(default)]
	pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

fn enabled() -> bool {
	true
}

fn default_indent_width() -> usize {
	4
}

fn default_max_preserve_newlines() -> usize {
	2
}

fn default_extensions() -> Vec<String> {
	vec!["twig".to_string()]
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

impl TwigConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> TwigResult<Option<TwigConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;

		Ok(Some(config))
	}

	pub fn parse(content: &str) -> TwigResult<TwigConfig> {
		toml::from_str(content).map_err(|e| TwigError::ConfigParse(e.to_string()))
	}

	pub fn lint_options(&self) -> LintOptions {
		LintOptions {
			operator_spacing: self.lint.operator_spacing,
			empty_expression: self.lint.empty_expression,
		}
	}

	pub fn reflow_options(&self) -> ReflowOptions {
		ReflowOptions {
			printer: PrinterOptions {
				indent_width: self.format.indent_width,
				use_tabs: self.format.use_tabs,
				max_preserve_newlines: self.format.max_preserve_newlines,
				..PrinterOptions::default()
			},
			markup_indent: self.format.markup_indent,
		}
	}

	/// Build the configured markup printer. Commands run from `root`.
	pub fn printer(&self, root: &Path) -> TwigResult<Box<dyn MarkupPrinter + Send + Sync>> {
		match &self.format.printer {
			PrinterConfig::Name(name) if name == "builtin" => Ok(Box::new(BuiltinPrinter)),
			PrinterConfig::Name(name) => {
				Err(TwigError::ConfigParse(format!(
					"unknown printer `{name}`, expected \"builtin\" or {{ command = \"...\" }}"
				)))
			}
			PrinterConfig::Command { command } => {
				Ok(Box::new(
					CommandPrinter::new(command.clone()).with_working_dir(root),
				))
			}
		}
	}

	/// True when `path` ends with one of the configured extensions.
	pub fn has_template_extension(&self, path: &Path) -> bool {
		let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
			return false;
		};

		self.files.extensions.iter().any(|extension| {
			let extension = extension.trim_start_matches('.');
			name.len() > extension.len() + 1
				&& name.ends_with(extension)
				&& name[..name.len() - extension.len()].ends_with('.')
		})
	}
}
