use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Check, format and fold Twig templates.",
	long_about = "twigkit understands the structure of Twig templates: the `{{ }}`, `{% %}` and \
	              `{# #}` regions mixed into HTML, the block tags that must nest, and the markup \
	              around them.\n\nQuick start:\n  twigkit init    Create a twigkit.toml\n  \
	              twigkit check   Report syntax, nesting and filter problems\n  twigkit format  \
	              Re-indent templates by block depth\n  twigkit lsp     Run the language server"
)]
pub struct TwigkitCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a `twigkit.toml` with the default settings.
	///
	/// If a config file already exists this command leaves it alone and
	/// exits successfully.
	Init,
	/// Analyze templates and report diagnostics.
	///
	/// Every template in the project is scanned for unterminated regions,
	/// mismatched or unclosed block tags, unknown tags and filters, and
	/// operator spacing. Exits with status 1 when any error is found. Style
	/// diagnostics only fail the check with `--strict`.
	Check {
		/// Check only these files instead of the whole project.
		files: Vec<PathBuf>,

		/// Output format. Use `text` for humans, `json` for tools, or
		/// `github` for GitHub Actions annotations.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,

		/// Treat style diagnostics as errors.
		#[arg(long, default_value_t = false)]
		strict: bool,

		/// Re-run the check whenever a file changes.
		#[arg(long, default_value_t = false)]
		watch: bool,
	},
	/// Re-indent templates by block depth.
	///
	/// Template regions are protected while the markup printer configured in
	/// `twigkit.toml` reformats the surrounding markup, then every line is
	/// indented by the number of open blocks around it. A printer failure
	/// leaves every file untouched.
	Format {
		/// Format only these files instead of the whole project.
		files: Vec<PathBuf>,

		/// Do not write anything. Exit with status 1 if any file would
		/// change.
		#[arg(long, default_value_t = false)]
		check: bool,

		/// Print a unified diff of the changes instead of writing them.
		/// Exits with status 1 if any file would change.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
	/// Print the fold range that starts on a line.
	///
	/// Lines and columns are 0-indexed, as editors report them. The range is
	/// printed as JSON, or `no fold` when nothing folds there.
	Fold {
		/// The template file.
		file: PathBuf,

		/// 0-indexed line the fold starts on.
		line: usize,

		/// 0-indexed column of the cursor.
		#[arg(default_value_t = 0)]
		column: usize,
	},
	/// Start the twigkit language server (LSP).
	///
	/// Communicates over stdin/stdout using the Language Server Protocol and
	/// provides diagnostics, formatting, folding ranges, completions and
	/// hover documentation for Twig templates.
	Lsp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors.
	Text,
	/// JSON output for programmatic consumption.
	Json,
	/// GitHub Actions annotation format. Emits `::error` or `::warning`
	/// annotations that appear inline on pull request diffs.
	Github,
}
