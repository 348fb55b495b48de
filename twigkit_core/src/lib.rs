//! `twigkit_core` is the structural analysis library behind twigkit, a
//! toolkit for Twig templates. It finds template regions in mixed markup,
//! classifies statement tags, validates nesting, re-indents documents around
//! an external markup printer and resolves fold ranges.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template text
//!   → Region scanner (splits text into `{{ }}`, `{% %}`, `{# #}` and literal text)
//!   → Tag classifier (keyword, closer flag and nesting role of each statement)
//!   → Nesting validator (diagnostics for syntax, structure, filters and style)
//!   → Reflow engine (protect regions, print markup, restore, re-indent by block depth)
//!   → Fold resolver (block, element and fixed-pair fold spans)
//! ```
//!
//! ## Modules
//!
//! - [`config`] loads `twigkit.toml`.
//! - [`project`] walks a directory tree and checks or formats every template.
//! - [`vocabulary`] holds the tag, filter, function and test tables shared by
//!   validation and completion.
//!
//! ## Quick Start
//!
//! ```rust
//! use twigkit_core::Category;
//! use twigkit_core::LintOptions;
//! use twigkit_core::analyze;
//! use twigkit_core::resolve_fold;
//!
//! let text = "{% if user %}\n  {{ user.name|upper }}\n{% endfor %}";
//! let diagnostics = analyze(text, &LintOptions::default());
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].category(), Category::Structural);
//!
//! let span = resolve_fold("{% if x %}\n  a\n{% endif %}", 0, 0);
//! assert_eq!(span.map(|span| span.to_line), Some(2));
//! ```

pub use classifier::*;
pub use completion::*;
pub use config::*;
pub use error::*;
pub use fold::*;
pub use markup::*;
pub use position::*;
pub use project::*;
pub use reflow::*;
pub use scanner::*;
pub use validator::*;

mod classifier;
mod completion;
pub mod config;
#[allow(unused_assignments)]
mod error;
mod fold;
mod markup;
mod position;
pub mod project;
mod reflow;
mod scanner;
mod validator;
pub mod vocabulary;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
