use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use twigkit_cli::Commands;
use twigkit_cli::OutputFormat;
use twigkit_cli::TwigkitCli;
use twigkit_core::AnyEmptyResult;
use twigkit_core::AnyResult;
use twigkit_core::CheckResult;
use twigkit_core::Diagnostic;
use twigkit_core::FileUpdate;
use twigkit_core::TwigConfig;
use twigkit_core::TwigError;
use twigkit_core::check_project;
use twigkit_core::compute_formatting;
use twigkit_core::config::DEFAULT_CONFIG;
use twigkit_core::normalize_line_endings;
use twigkit_core::project::ProjectContext;
use twigkit_core::project::scan_project;
use twigkit_core::resolve_fold;
use twigkit_core::write_updates;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,cyan) => {
		if color_enabled() {
			format!("{}", $text.cyan())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = TwigkitCli::parse();

	// Respect NO_COLOR, --no-color, and terminals without color support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Check {
			files,
			format,
			strict,
			watch,
		}) => run_check(&args, files, *format, *strict, *watch),
		Some(Commands::Format { files, check, diff }) => run_format(&args, files, *check, *diff),
		Some(Commands::Fold { file, line, column }) => run_fold(&args, file, *line, *column),
		Some(Commands::Lsp) => run_lsp(),
		None => {
			eprintln!("No subcommand specified. Run `twigkit --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<TwigError>() {
			Ok(twig_err) => {
				let report: miette::Report = (*twig_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Logs go to stderr. `TWIGKIT_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_env("TWIGKIT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.without_time()
		.try_init();
}

fn resolve_root(args: &TwigkitCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}

/// Scan the project, narrowed to `files` when any are given. Relative file
/// arguments are resolved against the project root.
fn load_context(args: &TwigkitCli, files: &[PathBuf]) -> AnyResult<ProjectContext> {
	let root = resolve_root(args);
	let ctx = scan_project(&root)?;

	if args.verbose {
		println!("Scanned project: {} template file(s)", ctx.files.len());
	}

	if files.is_empty() {
		return Ok(ctx);
	}

	let files = files.iter().map(|file| root.join(file)).collect();
	Ok(ctx.with_files(files))
}

fn run_init(args: &TwigkitCli) -> AnyEmptyResult {
	let root = resolve_root(args);

	if let Some(existing) = TwigConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let config_path = root.join("twigkit.toml");
	std::fs::write(&config_path, DEFAULT_CONFIG)?;
	println!("Created twigkit.toml");
	println!();
	println!("Next steps:");
	println!("  1. Adjust the [lint] and [format] sections to taste");
	println!("  2. Run `twigkit check` to analyze your templates");
	println!("  3. Run `twigkit format` to re-indent them");

	Ok(())
}

fn run_check(
	args: &TwigkitCli,
	files: &[PathBuf],
	format: OutputFormat,
	strict: bool,
	watch: bool,
) -> AnyEmptyResult {
	let failed = run_check_once(args, files, format, strict)?;

	if !watch {
		if failed {
			process::exit(1);
		}
		return Ok(());
	}

	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let root = resolve_root(args);
	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				if matches!(
					event.kind,
					notify::EventKind::Modify(_) | notify::EventKind::Create(_)
				) {
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&root, notify::RecursiveMode::Recursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}
		debug!("file change detected");

		println!("\nFile change detected, checking...");
		if let Err(e) = run_check_once(args, files, format, strict) {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

/// Run a single check and return whether it failed.
fn run_check_once(
	args: &TwigkitCli,
	files: &[PathBuf],
	format: OutputFormat,
	strict: bool,
) -> AnyResult<bool> {
	let ctx = load_context(args, files)?;
	let root = resolve_root(args);
	let strict = strict || ctx.config.lint.strict;
	let result = check_project(&ctx)?;
	let ok = result.is_ok(strict);

	match format {
		OutputFormat::Json => {
			let files: Vec<serde_json::Value> = result
				.with_diagnostics()
				.map(|report| {
					serde_json::json!({
						"file": make_relative(&report.path, &root),
						"diagnostics": report.diagnostics,
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": ok,
				"errors": result.error_count(),
				"warnings": result.warning_count(),
				"files": files,
			});
			println!("{output}");
		}
		OutputFormat::Github => {
			for report in result.with_diagnostics() {
				let rel = make_relative(&report.path, &root);
				for diagnostic in report.diagnostics.iter() {
					let level = if diagnostic.is_error() || strict {
						"error"
					} else {
						"warning"
					};
					println!(
						"::{level} file={rel},line={},col={}::{}",
						diagnostic.line,
						diagnostic.column,
						diagnostic.message()
					);
				}
			}
			eprintln!("{}", check_summary(&result));
		}
		OutputFormat::Text => {
			for report in result.with_diagnostics() {
				let rel = make_relative(&report.path, &root);
				for diagnostic in report.diagnostics.iter() {
					print_diagnostic(&rel, diagnostic);
				}
			}

			if result.error_count() + result.warning_count() > 0 {
				println!();
			}
			println!("{}", check_summary(&result));
		}
	}

	Ok(!ok)
}

fn print_diagnostic(rel: &str, diagnostic: &Diagnostic) {
	let location = colored!(format!("{rel}:{}:{}", diagnostic.line, diagnostic.column), bold);
	let category = format!("{}:", diagnostic.category());
	let category = if diagnostic.is_error() {
		colored!(category, red)
	} else {
		colored!(category, yellow)
	};
	println!("{location} {category} {}", diagnostic.message());
}

fn check_summary(result: &CheckResult) -> String {
	let errors = result.error_count();
	let warnings = result.warning_count();
	let checked = result.files.len();

	if errors + warnings == 0 {
		return format!("No problems found in {checked} file(s).");
	}

	format!("Found {errors} error(s) and {warnings} warning(s) in {checked} file(s).")
}

fn run_format(args: &TwigkitCli, files: &[PathBuf], check: bool, diff: bool) -> AnyEmptyResult {
	let ctx = load_context(args, files)?;
	let root = resolve_root(args);
	let result = compute_formatting(&ctx)?;

	if check || diff {
		if diff {
			for update in &result.updates {
				print_diff(update);
			}
		}

		if result.is_clean() {
			println!("All {} file(s) are formatted.", result.unchanged);
			return Ok(());
		}

		for update in &result.updates {
			eprintln!("would reformat {}", make_relative(&update.path, &root));
		}
		eprintln!(
			"{} file(s) would be reformatted. Run `twigkit format` to fix.",
			result.updates.len()
		);
		process::exit(1);
	}

	if result.is_clean() {
		println!("All {} file(s) are already formatted.", result.unchanged);
		return Ok(());
	}

	write_updates(&result)?;
	println!("Formatted {} file(s).", result.updates.len());

	if args.verbose {
		for update in &result.updates {
			println!("  {}", make_relative(&update.path, &root));
		}
	}

	Ok(())
}

/// Print a unified diff, colorized by line.
fn print_diff(update: &FileUpdate) {
	for line in update.diff().lines() {
		if line.starts_with("+++") || line.starts_with("---") {
			println!("{}", colored!(line, bold));
		} else if line.starts_with("@@") {
			println!("{}", colored!(line, cyan));
		} else if line.starts_with('+') {
			println!("{}", colored!(line, green));
		} else if line.starts_with('-') {
			println!("{}", colored!(line, red));
		} else {
			println!("{line}");
		}
	}
}

fn run_fold(args: &TwigkitCli, file: &Path, line: usize, column: usize) -> AnyEmptyResult {
	let path = resolve_root(args).join(file);
	let text = normalize_line_endings(&std::fs::read_to_string(&path)?);

	match resolve_fold(&text, line, column) {
		Some(span) => println!("{}", serde_json::to_string(&span)?),
		None => println!("no fold"),
	}

	Ok(())
}

fn run_lsp() -> AnyEmptyResult {
	let rt = tokio::runtime::Runtime::new()?;
	rt.block_on(twigkit_lsp::run_server());
	Ok(())
}
