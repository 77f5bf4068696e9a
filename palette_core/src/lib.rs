//! `palette_core` is the template composition engine behind
//! [palette](https://github.com/ifiokjr/palette). Templates declare reusable
//! components with named blocks, and pages render those components while
//! overriding only the blocks they care about.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template source
//!   → Lexer (cuts the source into text segments and palette tags)
//!   → Parser (matches opening and closing tags into a typed node tree)
//!   → Registry (stores component definitions by name)
//!   → Lowering (turns each node list into one minijinja template with palette calls)
//!   → Engine (resolves invocations, applies overrides, renders with minijinja)
//! ```
//!
//! ## Syntax
//!
//! ```html
//! {% palette_component "card" %}
//!   <div class="card">
//!     <h5>{% palette_block header %}{{ title }}{% endpalette_block %}</h5>
//!     <p>{% palette_block body %}{{ content }}{% endpalette_block %}</p>
//!   </div>
//! {% endpalette_component %}
//!
//! {% palette_ui component="card" title="Hi" content="World" %}
//!   {% palette_override header %}<strong>{{ block.super }}</strong>{% endpalette_override %}
//! {% endpalette_ui %}
//! ```
//!
//! Blocks that are not overridden render their default content. Text outside
//! the palette tags is ordinary [`minijinja`](https://docs.rs/minijinja)
//! template syntax evaluated against the [`Context`], and palette tags may be
//! placed inside its `{% for %}` and `{% if %}` blocks.
//!
//! ## Modules
//!
//! - [`config`] loads `palette.toml`: template roots, render options and data
//!   files.
//! - [`project`] scans template roots and registers every declaration.
//!
//! ## Quick Start
//!
//! ```rust
//! use palette_core::Context;
//! use palette_core::Engine;
//! use palette_core::Registry;
//! use palette_core::RenderOptions;
//!
//! let engine = Engine::new(RenderOptions::default());
//! let mut registry = Registry::new();
//! let source = concat!(
//! 	r#"{% palette_component "card" %}"#,
//! 	r#"<h5>{% palette_block header %}{{ title }}{% endpalette_block %}</h5>"#,
//! 	r#"{% endpalette_component %}"#,
//! 	r#"{% palette_ui component="card" title="Hi" %}{% endpalette_ui %}"#,
//! );
//!
//! let html = engine.render_str(source, &mut registry, &Context::new()).unwrap();
//! assert_eq!(html, "<h5>Hi</h5>");
//! assert!(registry.contains("card"));
//! ```

pub use ast::*;
pub use check::*;
pub use config::*;
pub use context::*;
pub use engine::*;
pub use error::*;
pub use fields::*;
pub use loader::*;
pub use parser::*;
pub use position::*;
pub use project::*;
pub use registry::*;

mod ast;
mod check;
mod compile;
pub mod config;
mod context;
mod engine;
#[allow(unused_assignments)]
mod error;
mod fields;
pub(crate) mod lexer;
mod loader;
mod parser;
mod position;
pub mod project;
mod registry;
pub(crate) mod tokens;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
