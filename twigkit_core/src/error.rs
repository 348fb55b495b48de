use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum TwigError {
	#[error(transparent)]
	#[diagnostic(code(twigkit::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(twigkit::config_parse),
		help("check that twigkit.toml is valid TOML with [lint], [format], [files] and/or [exclude] sections")
	)]
	ConfigParse(String),

	#[error("markup printer failed: {0}")]
	#[diagnostic(
		code(twigkit::printer),
		help("the document was left unchanged; fix the markup or switch to the builtin printer")
	)]
	Printer(String),

	#[error("printer command `{command}` failed: {reason}")]
	#[diagnostic(
		code(twigkit::printer_command),
		help("the command receives the document on stdin and must print the result on stdout")
	)]
	PrinterCommand { command: String, reason: String },

	#[error("markup printer dropped the template region placeholder `{0}`")]
	#[diagnostic(
		code(twigkit::placeholder_lost),
		help("the printer must keep placeholder words intact; the document was left unchanged")
	)]
	PlaceholderLost(String),

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(twigkit::file_too_large),
		help("increase `max_file_size` in twigkit.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },

	#[error("invalid exclude pattern `{pattern}`: {reason}")]
	#[diagnostic(
		code(twigkit::invalid_exclude_pattern),
		help("exclude patterns use gitignore syntax, e.g. `vendor/` or `*.min.twig`")
	)]
	InvalidExcludePattern { pattern: String, reason: String },

	#[error("symlink cycle detected at: `{path}`")]
	#[diagnostic(
		code(twigkit::symlink_cycle),
		help("remove the circular symlink or exclude this path")
	)]
	SymlinkCycle { path: String },
}

pub type TwigResult<T> = Result<T, TwigError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
