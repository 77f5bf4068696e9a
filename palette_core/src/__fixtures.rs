use serde::Serialize;

use crate::Context;
use crate::Engine;
use crate::PaletteResult;
use crate::Registry;
use crate::RenderOptions;

/// A card whose blocks wrap their own markup, so an override replaces the
/// whole heading.
pub const CARD_COMPONENT: &str = concat!(
	r#"{% palette_component "card" %}"#,
	r"{% palette_block header %}<h5>{{ title }}</h5>{% endpalette_block %}",
	r"{% palette_block body %}<p>{{ content }}</p>{% endpalette_block %}",
	r"{% endpalette_component %}",
);

/// A card that renders the `body` block between brackets.
pub const BRACKET_COMPONENT: &str =
	r#"{% palette_component "bracket" %}[{% palette_block body %}{% endpalette_block %}]{% endpalette_component %}"#;

/// A panel that passes its own `content` block into a bracket.
pub const PANEL_COMPONENT: &str = concat!(
	r#"{% palette_component "panel" %}<section>"#,
	r#"{% palette_ui component="bracket" %}"#,
	r"{% palette_override body %}{% palette_block content %}default{% endpalette_block %}{% endpalette_override %}",
	r"{% endpalette_ui %}",
	r"</section>{% endpalette_component %}",
);

pub fn engine() -> Engine {
	Engine::new(RenderOptions::default())
}

pub fn strict_engine() -> Engine {
	Engine::new(RenderOptions {
		strict_overrides: true,
		..RenderOptions::default()
	})
}

/// A registry holding the card, bracket and panel components.
pub fn registry() -> PaletteResult<Registry> {
	let mut registry = Registry::new();
	let source = [CARD_COMPONENT, BRACKET_COMPONENT, PANEL_COMPONENT].concat();
	engine().render_str(&source, &mut registry, &Context::new())?;

	Ok(registry)
}

/// Render `source` on top of the fixture registry.
pub fn render_page(source: &str, context: &Context) -> PaletteResult<String> {
	let mut registry = registry()?;
	engine().render_str(source, &mut registry, context)
}

pub fn json_context(value: serde_json::Value) -> Context {
	Context::from_serialize(&value).expect("context must be a json object")
}

#[derive(Serialize)]
pub struct Article {
	pub title: String,
	pub is_published: bool,
	pub summary: Option<String>,
	pub views: u32,
}

pub fn article() -> Article {
	Article {
		title: "Hello".into(),
		is_published: true,
		summary: None,
		views: 5,
	}
}
