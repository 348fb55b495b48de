use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tower_lsp_server::Client;
use tower_lsp_server::LanguageServer;
use tower_lsp_server::jsonrpc::Result as LspResult;
use tower_lsp_server::ls_types::*;
use tracing::debug;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use twigkit_core::Category;
use twigkit_core::Completion;
use twigkit_core::LintOptions;
use twigkit_core::MarkupPrinter;
use twigkit_core::ReflowOptions;
use twigkit_core::TwigConfig;
use twigkit_core::TwigResult;
use twigkit_core::analyze;
use twigkit_core::completions_at;
use twigkit_core::fold_ranges;
use twigkit_core::normalize_line_endings;
use twigkit_core::reformat;
use twigkit_core::vocabulary::lookup;

/// Workspace-level state shared across all LSP requests.
#[derive(Debug, Default)]
struct ServerState {
	/// The workspace root path.
	root: Option<PathBuf>,
	/// The workspace `twigkit.toml`, or defaults.
	config: TwigConfig,
	/// Open documents keyed by URI.
	documents: HashMap<Uri, String>,
}

impl ServerState {
	/// Reload the config from the workspace root. Called on initialize and
	/// whenever the config file is saved.
	fn reload_config(&mut self) {
		let Some(root) = &self.root else {
			return;
		};

		match TwigConfig::load(root) {
			Ok(config) => self.config = config.unwrap_or_default(),
			Err(e) => warn!(error = %e, "failed to load config, keeping the previous one"),
		}
	}

	/// Printer commands run from the workspace root.
	fn printer_root(&self) -> PathBuf {
		self.root.clone().unwrap_or_else(|| PathBuf::from("."))
	}
}

/// UTF-16 length of `text`, the unit LSP columns are counted in.
fn utf16_len(text: &str) -> u32 {
	text.encode_utf16().count() as u32
}

/// UTF-16 offset of the 0-indexed character column `column` in `line`.
fn char_column_to_utf16(line: &str, column: usize) -> u32 {
	line.chars().take(column).map(char::len_utf16).sum::<usize>() as u32
}

/// The line at `position` and the byte index of the position inside it.
/// Positions past the end of the line are clamped to its end.
fn line_at(content: &str, position: Position) -> Option<(&str, usize)> {
	let line = content.split('\n').nth(position.line as usize)?;
	let line = line.strip_suffix('\r').unwrap_or(line);

	// LSP character offsets are in UTF-16 code units.
	let mut utf16_offset = 0u32;
	for (byte_idx, c) in line.char_indices() {
		if utf16_offset >= position.character {
			return Some((line, byte_idx));
		}
		utf16_offset += c.len_utf16() as u32;
	}

	Some((line, line.len()))
}

/// The position just past the last character of `content`.
fn end_position(content: &str) -> Position {
	let line = content.matches('\n').count() as u32;
	let last = content.rsplit('\n').next().unwrap_or_default();
	Position::new(line, utf16_len(last))
}

/// The twigkit language server.
#[derive(Debug)]
pub struct TwigLanguageServer {
	client: Client,
	state: RwLock<ServerState>,
}

impl TwigLanguageServer {
	pub fn new(client: Client) -> Self {
		Self {
			client,
			state: RwLock::new(ServerState::default()),
		}
	}

	/// Publish the full diagnostic set for a single document.
	async fn publish_diagnostics_for(&self, uri: &Uri) {
		let diagnostics = {
			let state = self.state.read().await;
			state
				.documents
				.get(uri)
				.map(|content| compute_diagnostics(content, &state.config.lint_options()))
				.unwrap_or_default()
		};

		self.client
			.publish_diagnostics(uri.clone(), diagnostics, None)
			.await;
	}

	async fn on_document_change(&self, uri: &Uri, content: String) {
		{
			let mut state = self.state.write().await;
			state.documents.insert(uri.clone(), content);
		}
		self.publish_diagnostics_for(uri).await;
	}
}

impl LanguageServer for TwigLanguageServer {
	async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
		// Prefer `workspace_folders`, fall back to the deprecated `root_uri`.
		let root = params
			.workspace_folders
			.as_ref()
			.and_then(|folders| folders.first())
			.and_then(|folder| folder.uri.to_file_path().map(std::borrow::Cow::into_owned))
			.or_else(|| {
				#[allow(deprecated)]
				params
					.root_uri
					.as_ref()
					.and_then(|uri| uri.to_file_path().map(std::borrow::Cow::into_owned))
			});

		{
			let mut state = self.state.write().await;
			state.root = root;
			state.reload_config();
		}

		Ok(InitializeResult {
			capabilities: ServerCapabilities {
				text_document_sync: Some(TextDocumentSyncCapability::Kind(
					TextDocumentSyncKind::FULL,
				)),
				hover_provider: Some(HoverProviderCapability::Simple(true)),
				completion_provider: Some(CompletionOptions {
					trigger_characters: Some(vec![
						"|".to_string(),
						"%".to_string(),
						" ".to_string(),
					]),
					..Default::default()
				}),
				folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
				document_formatting_provider: Some(OneOf::Left(true)),
				..Default::default()
			},
			server_info: Some(ServerInfo {
				name: "twigkit-lsp".to_string(),
				version: Some(env!("CARGO_PKG_VERSION").to_string()),
			}),
			offset_encoding: None,
		})
	}

	async fn initialized(&self, _: InitializedParams) {
		self.client
			.log_message(MessageType::INFO, "twigkit language server initialized")
			.await;
	}

	async fn shutdown(&self) -> LspResult<()> {
		Ok(())
	}

	async fn did_open(&self, params: DidOpenTextDocumentParams) {
		let uri = params.text_document.uri;
		let content = params.text_document.text;
		self.on_document_change(&uri, content).await;
	}

	async fn did_change(&self, params: DidChangeTextDocumentParams) {
		let uri = params.text_document.uri;

		// Full sync: the last change holds the whole document.
		if let Some(change) = params.content_changes.into_iter().next_back() {
			self.on_document_change(&uri, change.text).await;
		}
	}

	async fn did_save(&self, params: DidSaveTextDocumentParams) {
		let uri = &params.text_document.uri;

		if uri.path().as_str().ends_with("twigkit.toml") {
			let open: Vec<Uri> = {
				let mut state = self.state.write().await;
				state.reload_config();
				state.documents.keys().cloned().collect()
			};
			debug!(documents = open.len(), "config saved, republishing diagnostics");

			for uri in &open {
				self.publish_diagnostics_for(uri).await;
			}
			return;
		}

		if let Some(text) = params.text {
			self.on_document_change(uri, text).await;
		} else {
			self.publish_diagnostics_for(uri).await;
		}
	}

	async fn did_close(&self, params: DidCloseTextDocumentParams) {
		let uri = params.text_document.uri;
		{
			let mut state = self.state.write().await;
			state.documents.remove(&uri);
		}
		// Clear diagnostics for the closed document.
		self.client.publish_diagnostics(uri, Vec::new(), None).await;
	}

	async fn formatting(
		&self,
		params: DocumentFormattingParams,
	) -> LspResult<Option<Vec<TextEdit>>> {
		let uri = &params.text_document.uri;

		let result = {
			let state = self.state.read().await;
			let Some(content) = state.documents.get(uri) else {
				return Ok(None);
			};

			state
				.config
				.printer(&state.printer_root())
				.and_then(|printer| {
					format_document(content, printer.as_ref(), &state.config.reflow_options())
				})
		};

		match result {
			Ok(edits) => Ok(Some(edits)),
			Err(e) => {
				warn!(error = %e, "formatting failed");
				self.client
					.show_message(MessageType::ERROR, format!("twigkit: {e}"))
					.await;
				Ok(None)
			}
		}
	}

	async fn folding_range(&self, params: FoldingRangeParams) -> LspResult<Option<Vec<FoldingRange>>> {
		let uri = &params.text_document.uri;

		let state = self.state.read().await;
		Ok(state
			.documents
			.get(uri)
			.map(|content| compute_folding_ranges(content)))
	}

	async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
		let uri = &params.text_document_position_params.text_document.uri;
		let position = params.text_document_position_params.position;

		let state = self.state.read().await;
		Ok(state
			.documents
			.get(uri)
			.and_then(|content| compute_hover(content, position)))
	}

	async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
		let uri = &params.text_document_position.text_document.uri;
		let position = params.text_document_position.position;

		let state = self.state.read().await;
		let items = state
			.documents
			.get(uri)
			.map(|content| compute_completions(content, position))
			.unwrap_or_default();

		if items.is_empty() {
			Ok(None)
		} else {
			Ok(Some(CompletionResponse::Array(items)))
		}
	}
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Analyze a document. Each finding covers its line from the region start
/// to the end of the line.
fn compute_diagnostics(content: &str, options: &LintOptions) -> Vec<Diagnostic> {
	let lines: Vec<&str> = content.lines().collect();

	analyze(content, options)
		.iter()
		.map(|diagnostic| {
			let line_idx = diagnostic.line.saturating_sub(1);
			let line = lines.get(line_idx).copied().unwrap_or_default();
			let line_idx = line_idx as u32;
			let start = char_column_to_utf16(line, diagnostic.column.saturating_sub(1));
			let category = diagnostic.category();

			Diagnostic {
				range: Range::new(
					Position::new(line_idx, start),
					Position::new(line_idx, utf16_len(line).max(start)),
				),
				severity: Some(if category == Category::Style {
					DiagnosticSeverity::WARNING
				} else {
					DiagnosticSeverity::ERROR
				}),
				code: Some(NumberOrString::String(category.to_string())),
				source: Some("twigkit".to_string()),
				message: diagnostic.message(),
				..Default::default()
			}
		})
		.collect()
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Reformat a document into at most one edit replacing the whole text. An
/// already formatted document yields no edits.
fn format_document(
	content: &str,
	printer: &dyn MarkupPrinter,
	options: &ReflowOptions,
) -> TwigResult<Vec<TextEdit>> {
	let formatted = reformat(&normalize_line_endings(content), printer, options)?;
	if formatted == content {
		return Ok(Vec::new());
	}

	Ok(vec![TextEdit {
		range: Range::new(Position::new(0, 0), end_position(content)),
		new_text: formatted,
	}])
}

// ---------------------------------------------------------------------------
// Folding
// ---------------------------------------------------------------------------

fn compute_folding_ranges(content: &str) -> Vec<FoldingRange> {
	let content = normalize_line_endings(content);
	let lines: Vec<&str> = content.split('\n').collect();

	fold_ranges(&content)
		.into_iter()
		.map(|span| {
			let end_line = lines.get(span.to_line).copied().unwrap_or_default();
			FoldingRange {
				start_line: span.from_line as u32,
				start_character: Some(span.from_col as u32),
				end_line: span.to_line as u32,
				end_character: Some(char_column_to_utf16(end_line, span.to_col)),
				kind: Some(FoldingRangeKind::Region),
				..Default::default()
			}
		})
		.collect()
}

// ---------------------------------------------------------------------------
// Hover
// ---------------------------------------------------------------------------

fn is_word_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || ch == '_'
}

/// Describe the vocabulary word under the cursor.
fn compute_hover(content: &str, position: Position) -> Option<Hover> {
	let (line, cursor) = line_at(content, position)?;

	let start = line[..cursor]
		.char_indices()
		.rev()
		.take_while(|(_, ch)| is_word_char(*ch))
		.last()
		.map_or(cursor, |(index, _)| index);
	let end = line[cursor..]
		.char_indices()
		.find(|(_, ch)| !is_word_char(*ch))
		.map_or(line.len(), |(index, _)| cursor + index);

	let word = &line[start..end];
	if word.is_empty() {
		return None;
	}

	let entries = lookup(word);
	if entries.is_empty() {
		return None;
	}

	let value = entries
		.iter()
		.map(|(kind, entry)| format!("**{}** ({kind})\n\n{}", entry.name, entry.detail))
		.collect::<Vec<_>>()
		.join("\n\n---\n\n");

	Some(Hover {
		contents: HoverContents::Markup(MarkupContent {
			kind: MarkupKind::Markdown,
			value,
		}),
		range: Some(Range::new(
			Position::new(position.line, utf16_len(&line[..start])),
			Position::new(position.line, utf16_len(&line[..end])),
		)),
	})
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

fn completion_kind(item: &Completion) -> CompletionItemKind {
	match item {
		Completion::TagSnippet { .. } => CompletionItemKind::SNIPPET,
		Completion::Filter(_) | Completion::Function(_) => CompletionItemKind::FUNCTION,
		Completion::Test(_) => CompletionItemKind::OPERATOR,
		Completion::Keyword(_) => CompletionItemKind::KEYWORD,
	}
}

/// Completion items for the cursor position. Words replace the prefix being
/// typed; tag snippets replace the whole statement opener so the snippet's
/// own `{%` is not doubled.
fn compute_completions(content: &str, position: Position) -> Vec<CompletionItem> {
	let Some((line, cursor)) = line_at(content, position) else {
		return Vec::new();
	};

	let prefix = &line[..cursor];
	let list = completions_at(prefix);
	let word_start = prefix
		.char_indices()
		.nth(list.start)
		.map_or(prefix.len(), |(index, _)| index);
	let tag_start = prefix[..word_start].rfind("{%");
	let cursor_position = Position::new(position.line, utf16_len(prefix));

	list.items
		.iter()
		.enumerate()
		.map(|(index, item)| {
			let (start, new_text, filter_text, insert_text_format) =
				match (item.snippet(), tag_start) {
					(Some(snippet), Some(tag_start)) => {
						(
							tag_start,
							snippet.to_string(),
							Some(format!("{}{}", &prefix[tag_start..word_start], item.name())),
							Some(InsertTextFormat::SNIPPET),
						)
					}
					_ => (word_start, item.name().to_string(), None, None),
				};

			CompletionItem {
				label: item.name().to_string(),
				kind: Some(completion_kind(item)),
				detail: Some(item.detail().to_string()),
				sort_text: Some(format!("{index:03}")),
				filter_text,
				insert_text_format,
				text_edit: Some(CompletionTextEdit::Edit(TextEdit {
					range: Range::new(
						Position::new(position.line, utf16_len(&prefix[..start])),
						cursor_position,
					),
					new_text,
				})),
				..Default::default()
			}
		})
		.collect()
}

/// Start the LSP server on stdin/stdout. Used by the `twigkit lsp` CLI
/// subcommand. Logs go to stderr.
pub async fn run_server() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_env("TWIGKIT_LOG"))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.try_init();

	let stdin = tokio::io::stdin();
	let stdout = tokio::io::stdout();

	let (service, socket) = tower_lsp_server::LspService::new(TwigLanguageServer::new);
	tower_lsp_server::Server::new(stdin, stdout, socket)
		.serve(service)
		.await;
}
