use rstest::rstest;
use serde_json::json;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::lexer::tokenize;
use crate::tokens::Segment;
use crate::tokens::TagKind;
use crate::tokens::TagToken;

#[rstest]
#[case::plain_text("<div>{{ title }}</div>", 0)]
#[case::component(r#"{% palette_component "card" %}x{% endpalette_component %}"#, 2)]
#[case::whitespace_markers(r#"{%- palette_component "card" -%}{%- endpalette_component -%}"#, 2)]
#[case::jinja_tags_are_text("{% if a %}b{% endif %}", 0)]
#[case::comment(r#"{# {% palette_component "card" %} #}"#, 0)]
#[case::raw(r#"{% raw %}{% palette_ui component="card" %}{% endraw %}"#, 0)]
fn tokenize_counts_palette_tags(#[case] source: &str, #[case] expected: usize) -> PaletteResult<()> {
	let segments = tokenize(source)?;
	let tags = segments
		.iter()
		.filter(|segment| matches!(segment, Segment::Tag(_)))
		.count();
	assert_eq!(tags, expected);

	Ok(())
}

#[test]
fn tokenize_tag_arguments() -> PaletteResult<()> {
	let segments = tokenize(r#"{% palette_ui component="card" title='It\'s' count=page.count %}"#)?;
	let [Segment::Tag(tag)] = segments.as_slice() else {
		panic!("expected a single tag, got {segments:?}");
	};

	assert_eq!(tag.kind, TagKind::Render);
	assert_eq!(tag.tokens, vec![
		TagToken::Word("component".into()),
		TagToken::Equals,
		TagToken::Quoted("card".into(), b'"'),
		TagToken::Word("title".into()),
		TagToken::Equals,
		TagToken::Quoted("It's".into(), b'\''),
		TagToken::Word("count".into()),
		TagToken::Equals,
		TagToken::Word("page.count".into()),
	]);

	Ok(())
}

#[test]
fn tokenize_tracks_positions() -> PaletteResult<()> {
	let segments = tokenize("<div>\n  {% palette_block header %}")?;
	let Some(Segment::Tag(tag)) = segments.last() else {
		panic!("expected a trailing tag");
	};

	assert_eq!(tag.position, Position::new(2, 3, 8));

	Ok(())
}

#[test]
fn tokenize_quoted_tag_markers() -> PaletteResult<()> {
	let segments = tokenize(r#"<p>{% palette_ui component="card" title="{% if yes %}A{% endif %}" %}</p>"#)?;
	let [Segment::Text { .. }, Segment::Tag(tag), Segment::Text { content, .. }] = segments.as_slice() else {
		panic!("expected a single tag between text, got {segments:?}");
	};

	assert_eq!(content, "</p>");
	assert_eq!(tag.tokens[3..].to_vec(), vec![
		TagToken::Word("title".into()),
		TagToken::Equals,
		TagToken::Quoted("{% if yes %}A{% endif %}".into(), b'"'),
	]);

	Ok(())
}

#[test]
fn tokenize_trims_whitespace_around_markers() -> PaletteResult<()> {
	let segments = tokenize("<a>\n  {%- palette_block x -%}\n  b")?;
	let texts: Vec<&str> = segments
		.iter()
		.filter_map(|segment| {
			match segment {
				Segment::Text { content, .. } => Some(content.as_str()),
				Segment::Tag(_) => None,
			}
		})
		.collect();

	assert_eq!(texts, vec!["<a>", "b"]);

	Ok(())
}

#[test]
fn parse_component_declaration() -> PaletteResult<()> {
	let template = parse(CARD_COMPONENT)?;
	let components = template.components();

	assert_eq!(components.len(), 1);
	assert_eq!(components[0].name, "card");
	assert!(!components[0].inline);

	let definition = ComponentDefinition::from_declaration(components[0], None);
	assert_eq!(definition.block_names(), vec!["header", "body"]);

	Ok(())
}

#[test]
fn parse_render_invocation_arguments() -> PaletteResult<()> {
	let template = parse(concat!(
		r#"{% palette_ui component="card" file="components.html" title="Hi" "#,
		r#"subtitle="{{ page.subtitle }}" greeting="Hello {{ name }}" count=page.count "#,
		r#"with component="nested" %}{% endpalette_ui %}"#,
	))?;
	let invocations = template.invocations();
	let invocation = invocations[0];

	assert_eq!(invocation.component, ArgumentValue::Literal("card".into()));
	assert_eq!(
		invocation.file,
		Some(ArgumentValue::Literal("components.html".into()))
	);
	assert_eq!(invocation.context, vec![
		KeywordArgument {
			name: "title".into(),
			value: ArgumentValue::Literal("Hi".into()),
		},
		KeywordArgument {
			name: "subtitle".into(),
			value: ArgumentValue::Expression("page.subtitle".into()),
		},
		KeywordArgument {
			name: "greeting".into(),
			value: ArgumentValue::Template("Hello {{ name }}".into()),
		},
		KeywordArgument {
			name: "count".into(),
			value: ArgumentValue::Expression("page.count".into()),
		},
		KeywordArgument {
			name: "component".into(),
			value: ArgumentValue::Literal("nested".into()),
		},
	]);

	Ok(())
}

#[test]
fn parse_overrides_in_order() -> PaletteResult<()> {
	let template = parse(concat!(
		r#"{% palette_ui component="card" %}"#,
		"\n  {% palette_override header %}a{% endpalette_override %}",
		"\n  {% palette_override header %}b{% endpalette_override header %}",
		"\n{% endpalette_ui %}",
	))?;
	let invocation = template.invocations()[0];

	assert_eq!(invocation.overrides.len(), 2);
	let Some(last) = invocation.override_for("header") else {
		panic!("expected an override for header");
	};
	assert_eq!(last.position.line, 3);

	Ok(())
}

#[rstest]
#[case::block_outside_component(
	"{% palette_block header %}{% endpalette_block %}",
	"palette::block_outside_component"
)]
#[case::override_outside_invocation(
	"{% palette_override header %}{% endpalette_override %}",
	"palette::override_outside_invocation"
)]
#[case::unclosed_component(r#"{% palette_component "card" %}"#, "palette::unclosed_tag")]
#[case::unclosed_invocation(r#"{% palette_ui component="card" %}"#, "palette::unclosed_tag")]
#[case::stray_closer("{% endpalette_component %}", "palette::unexpected_closing_tag")]
#[case::mismatched_closer(
	r#"{% palette_component "card" %}{% endpalette_block %}"#,
	"palette::unexpected_closing_tag"
)]
#[case::missing_component_name("{% palette_component %}{% endpalette_component %}", "palette::missing_argument")]
#[case::missing_component_argument(
	r#"{% palette_ui title="x" %}{% endpalette_ui %}"#,
	"palette::missing_argument"
)]
#[case::duplicate_block(
	r#"{% palette_component "card" %}{% palette_block a %}{% endpalette_block %}{% palette_block a %}{% endpalette_block %}{% endpalette_component %}"#,
	"palette::duplicate_block"
)]
#[case::wrong_closing_name(
	r#"{% palette_component "card" %}{% endpalette_component "table" %}"#,
	"palette::syntax"
)]
#[case::block_inside_invocation(
	r#"{% palette_component "card" %}{% palette_ui component="x" %}{% palette_block a %}{% endpalette_block %}{% endpalette_ui %}{% endpalette_component %}"#,
	"palette::syntax"
)]
#[case::positional_argument(r#"{% palette_ui "card" %}{% endpalette_ui %}"#, "palette::syntax")]
#[case::unterminated_string(r#"{% palette_component "card %}"#, "palette::syntax")]
fn parse_errors(#[case] source: &str, #[case] code: &str) {
	let Err(error) = parse(source) else {
		panic!("expected `{source}` to fail");
	};

	let actual = miette::Diagnostic::code(&error).map(|code| code.to_string());
	assert_eq!(actual.as_deref(), Some(code), "{error}");
}

#[test]
fn parse_error_positions() {
	let Err(error) = parse("<div>\n{% palette_block header %}{% endpalette_block %}") else {
		panic!("expected an error");
	};

	assert!(matches!(
		error,
		PaletteError::BlockOutsideComponent { ref name, line: 2, column: 1 } if name == "header"
	));
}

#[test]
fn registry_operations() -> PaletteResult<()> {
	let mut registry = Registry::new();
	assert!(registry.is_empty());

	let first = ComponentDefinition::parse("card", "{% palette_block body %}a{% endpalette_block %}")?;
	let second = ComponentDefinition::parse("card", "{% palette_block body %}b{% endpalette_block %}")?;
	let alert = ComponentDefinition::parse("alert", "!")?;

	assert!(registry.register(first.clone()).is_none());
	assert!(registry.register(alert).is_none());
	let replaced = registry.register(second.clone());

	assert_eq!(replaced.as_deref(), Some(&first));
	assert_eq!(registry.len(), 2);
	assert_eq!(registry.names(), vec!["alert", "card"]);
	assert_eq!(registry.lookup("card")?.as_ref(), &second);
	assert!(matches!(
		registry.lookup("table"),
		Err(PaletteError::ComponentNotDeclared { ref name }) if name == "table"
	));

	registry.clear();
	assert!(registry.is_empty());
	assert!(!registry.contains("card"));

	Ok(())
}

#[test]
fn component_definition_nested_blocks() -> PaletteResult<()> {
	let definition = ComponentDefinition::parse(
		"layout",
		"{% palette_block outer %}<{% palette_block inner %}{% endpalette_block %}>{% endpalette_block %}{% palette_block footer %}{% endpalette_block %}",
	)?;

	assert_eq!(definition.block_names(), vec!["outer", "inner", "footer"]);
	assert!(definition.has_block("inner"));
	assert!(!definition.has_block("header"));

	Ok(())
}

#[test]
fn render_default_blocks() -> PaletteResult<()> {
	let context = Context::new();
	let html = render_page(
		r#"{% palette_ui component="card" title="Hi" content="World" %}{% endpalette_ui %}"#,
		&context,
	)?;

	insta::assert_snapshot!(html, @"<h5>Hi</h5><p>World</p>");

	Ok(())
}

#[test]
fn render_override_replaces_only_its_block() -> PaletteResult<()> {
	let html = render_page(
		concat!(
			r#"{% palette_ui component="card" title="Hi" content="World" %}"#,
			r"{% palette_override header %}<h1>{{ title }}</h1>{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&Context::new(),
	)?;

	insta::assert_snapshot!(html, @"<h1>Hi</h1><p>World</p>");

	Ok(())
}

#[test]
fn render_declaration_and_invocation_in_one_template() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let source = format!(
		"{CARD_COMPONENT}{}",
		r#"{% palette_ui component="card" title="Hi" content="World" %}{% endpalette_ui %}"#
	);
	let html = engine().render_str(&source, &mut registry, &Context::new())?;

	assert_eq!(html, "<h5>Hi</h5><p>World</p>");
	assert_eq!(registry.names(), vec!["card"]);

	Ok(())
}

#[test]
fn render_invocation_before_declaration() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let source = format!(
		"{}{CARD_COMPONENT}",
		r#"{% palette_ui component="card" title="Hi" content="World" %}{% endpalette_ui %}"#
	);
	let html = engine().render_str(&source, &mut registry, &Context::new())?;

	assert_eq!(html, "<h5>Hi</h5><p>World</p>");

	Ok(())
}

#[test]
fn render_is_idempotent() -> PaletteResult<()> {
	let engine = engine();
	let mut registry = registry()?;
	let context = Context::new().with("title", "Hi").with("content", "World");
	let template = parse(concat!(
		r#"{% palette_ui component="card" %}"#,
		r"{% palette_override body %}<em>{{ content }}</em>{% endpalette_override %}",
		r"{% endpalette_ui %}",
	))?;

	let first = engine.render(&template, &mut registry, &context)?;
	let second = engine.render(&template, &mut registry, &context)?;

	assert_eq!(first, second);
	assert_eq!(first, "<h5>Hi</h5><em>World</em>");

	Ok(())
}

#[test]
fn declarations_render_nothing() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let html = engine().render_str(&format!("a{CARD_COMPONENT}b"), &mut registry, &Context::new())?;

	assert_eq!(html, "ab");

	Ok(())
}

#[test]
fn inline_declaration_renders_default() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let html = engine().render_str(
		r#"{% palette_component "badge" inline %}<b>{% palette_block label %}New{% endpalette_block %}</b>{% endpalette_component %}"#,
		&mut registry,
		&Context::new(),
	)?;

	assert_eq!(html, "<b>New</b>");
	assert!(registry.contains("badge"));

	Ok(())
}

#[test]
fn block_super_renders_default() -> PaletteResult<()> {
	let html = render_page(
		concat!(
			r#"{% palette_ui component="card" title="<Hi>" %}"#,
			r"{% palette_override header %}<div>{{ block.super }}</div>{% endpalette_override %}",
			r"{% palette_override body %}{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&Context::new(),
	)?;

	insta::assert_snapshot!(html, @"<div><h5>&lt;Hi&gt;</h5></div>");

	Ok(())
}

#[test]
fn last_duplicate_override_wins() -> PaletteResult<()> {
	let html = render_page(
		concat!(
			r#"{% palette_ui component="bracket" %}"#,
			r"{% palette_override body %}first{% endpalette_override %}",
			r"{% palette_override body %}second{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&Context::new(),
	)?;

	assert_eq!(html, "[second]");

	Ok(())
}

#[test]
fn override_bodies_resolve_blocks_of_the_invoking_template() -> PaletteResult<()> {
	let default = render_page(
		r#"{% palette_ui component="panel" %}{% endpalette_ui %}"#,
		&Context::new(),
	)?;
	let custom = render_page(
		concat!(
			r#"{% palette_ui component="panel" %}"#,
			r"{% palette_override content %}custom{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&Context::new(),
	)?;

	assert_eq!(default, "<section>[default]</section>");
	assert_eq!(custom, "<section>[custom]</section>");

	Ok(())
}

#[test]
fn same_component_nested_through_overrides() -> PaletteResult<()> {
	let html = render_page(
		concat!(
			r#"{% palette_ui component="bracket" %}{% palette_override body %}"#,
			r#"{% palette_ui component="bracket" %}{% palette_override body %}x{% endpalette_override %}{% endpalette_ui %}"#,
			r"{% endpalette_override %}{% endpalette_ui %}",
		),
		&Context::new(),
	)?;

	assert_eq!(html, "[[x]]");

	Ok(())
}

#[rstest]
#[case::literal(r#"title="Hi""#, Context::new(), "<h5>Hi</h5>")]
#[case::escaped_literal(r#"title="<b>""#, Context::new(), "<h5>&lt;b&gt;</h5>")]
#[case::expression("title=page.title", json_context(json!({ "page": { "title": "Hi" } })), "<h5>Hi</h5>")]
#[case::quoted_expression(r#"title="{{ page.title }}""#, json_context(json!({ "page": { "title": "Hi" } })), "<h5>Hi</h5>")]
#[case::template(r#"title="Hello {{ name }}""#, Context::new().with("name", "Ada"), "<h5>Hello Ada</h5>")]
#[case::number_expression("title=5", Context::new(), "<h5>5</h5>")]
#[case::ambient_only("", Context::new().with("title", "Ambient"), "<h5>Ambient</h5>")]
#[case::keyword_wins(r#"title="Local""#, Context::new().with("title", "Ambient"), "<h5>Local</h5>")]
#[case::missing_variable("", Context::new(), "<h5></h5>")]
fn render_keyword_context(
	#[case] arguments: &str,
	#[case] context: Context,
	#[case] expected: &str,
) -> PaletteResult<()> {
	let source = format!(
		r#"{{% palette_ui component="card" {arguments} %}}{{% palette_override body %}}{{% endpalette_override %}}{{% endpalette_ui %}}"#
	);
	let html = render_page(&source, &context)?;

	assert_eq!(html, expected);

	Ok(())
}

#[test]
fn render_exposes_component_name() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let html = engine().render_str(
		r#"{% palette_component "named" %}{{ component_name }}{% endpalette_component %}{% palette_ui component="named" %}{% endpalette_ui %}"#,
		&mut registry,
		&Context::new(),
	)?;

	assert_eq!(html, "named");

	Ok(())
}

#[test]
fn render_component_name_from_expression() -> PaletteResult<()> {
	let context = Context::new().with("kind", "bracket");
	let html = render_page(
		r"{% palette_ui component=kind %}{% palette_override body %}x{% endpalette_override %}{% endpalette_ui %}",
		&context,
	)?;

	assert_eq!(html, "[x]");

	Ok(())
}

#[test]
fn render_undeclared_component() {
	let result = render_page(
		r#"{% palette_ui component="missing" %}{% endpalette_ui %}"#,
		&Context::new(),
	);

	assert!(matches!(
		result,
		Err(PaletteError::ComponentNotDeclared { ref name }) if name == "missing"
	));
}

#[test]
#[traced_test]
fn unknown_override_is_ignored() -> PaletteResult<()> {
	let html = render_page(
		concat!(
			r#"{% palette_ui component="bracket" %}"#,
			r"{% palette_override footer %}ignored{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&Context::new(),
	)?;

	assert_eq!(html, "[]");
	assert!(logs_contain("override does not match any block"));

	Ok(())
}

#[test]
fn unknown_override_fails_when_strict() -> PaletteResult<()> {
	let mut registry = registry()?;
	let result = strict_engine().render_str(
		concat!(
			r#"{% palette_ui component="bracket" %}"#,
			r"{% palette_override footer %}ignored{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&mut registry,
		&Context::new(),
	);

	assert!(matches!(
		result,
		Err(PaletteError::UnknownOverride { ref component, ref block })
			if component == "bracket" && block == "footer"
	));

	Ok(())
}

#[test]
fn cyclic_components_fail() {
	let mut registry = Registry::new();
	let result = engine().render_str(
		concat!(
			r#"{% palette_component "a" %}{% palette_ui component="b" %}{% endpalette_ui %}{% endpalette_component %}"#,
			r#"{% palette_component "b" %}{% palette_ui component="a" %}{% endpalette_ui %}{% endpalette_component %}"#,
			r#"{% palette_ui component="a" %}{% endpalette_ui %}"#,
		),
		&mut registry,
		&Context::new(),
	);

	assert!(matches!(
		result,
		Err(PaletteError::CyclicComponent { ref chain }) if chain == "a -> b -> a"
	));
}

#[test]
fn nesting_beyond_max_depth_fails() -> PaletteResult<()> {
	let engine = Engine::new(RenderOptions {
		max_depth: 1,
		..RenderOptions::default()
	});
	let mut registry = registry()?;
	let result = engine.render_str(
		concat!(
			r#"{% palette_ui component="bracket" %}{% palette_override body %}"#,
			r#"{% palette_ui component="bracket" %}{% endpalette_ui %}"#,
			r"{% endpalette_override %}{% endpalette_ui %}",
		),
		&mut registry,
		&Context::new(),
	);

	assert!(matches!(
		result,
		Err(PaletteError::RecursionLimit { limit: 1 })
	));

	Ok(())
}

#[test]
fn redeclaration_last_wins() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let engine = engine();
	engine.render_str(
		r#"{% palette_component "alert" %}old{% endpalette_component %}"#,
		&mut registry,
		&Context::new(),
	)?;
	let html = engine.render_str(
		r#"{% palette_component "alert" %}new{% endpalette_component %}{% palette_ui component="alert" %}{% endpalette_ui %}"#,
		&mut registry,
		&Context::new(),
	)?;

	assert_eq!(html, "new");

	Ok(())
}

#[test]
fn render_loads_component_files() -> PaletteResult<()> {
	let loader = MemoryLoader::new().with_template("components.html", CARD_COMPONENT);
	let engine = engine().with_loader(loader);
	let mut registry = Registry::new();

	let html = engine.render_str(
		r#"{% palette_ui component="card" file="components.html" title="Hi" content="World" %}{% endpalette_ui %}"#,
		&mut registry,
		&Context::new(),
	)?;

	assert_eq!(html, "<h5>Hi</h5><p>World</p>");
	let card = registry.lookup("card")?;
	assert_eq!(card.origin.as_deref(), Some("components.html"));

	Ok(())
}

#[test]
fn render_missing_component_file() {
	let engine = engine().with_loader(MemoryLoader::new());
	let mut registry = Registry::new();
	let result = engine.render_str(
		r#"{% palette_ui component="card" file="missing.html" %}{% endpalette_ui %}"#,
		&mut registry,
		&Context::new(),
	);

	assert!(matches!(
		result,
		Err(PaletteError::TemplateNotFound { ref name }) if name == "missing.html"
	));
}

#[test]
fn render_text_with_jinja_syntax() -> PaletteResult<()> {
	let context = Context::new().with("items", vec!["a", "b"]);
	let html = render_page(
		concat!(
			"{% for item in items %}{{ item }}{% endfor %}",
			"{# comment #}",
			r#"{% raw %}{% palette_ui component="card" %}{% endraw %}"#,
		),
		&context,
	)?;

	assert_eq!(html, r#"ab{% palette_ui component="card" %}"#);

	Ok(())
}

#[test]
fn lower_invocation_inside_loop() -> PaletteResult<()> {
	let template = parse(r#"{% for x in xs %}{% palette_ui component="stat" n=x %}{% endpalette_ui %}{% endfor %}"#)?;
	let unit = crate::compile::lower(&template.nodes);

	insta::assert_snapshot!(unit.source, @r#"{% for x in xs %}{{ __palette_ui(0, "stat", none, {"n": (x)}) }}{% endfor %}"#);
	assert_eq!(unit.calls.len(), 1);

	Ok(())
}

#[test]
fn render_invocation_inside_for_loop() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let html = engine().render_str(
		concat!(
			r#"{% palette_component "stat" %}<b>{{ n }}</b>{% endpalette_component %}"#,
			r#"{% for x in [1, 2] %}{% palette_ui component="stat" n=x %}{% endpalette_ui %}{% endfor %}"#,
		),
		&mut registry,
		&Context::new(),
	)?;

	insta::assert_snapshot!(html, @"<b>1</b><b>2</b>");

	Ok(())
}

#[rstest]
#[case::shown_default(true, "", "<h5>Hi</h5>")]
#[case::shown_override(true, "{% palette_override header %}Custom{% endpalette_override %}", "<h5>Custom</h5>")]
#[case::hidden(false, "{% palette_override header %}Custom{% endpalette_override %}", "")]
fn render_block_inside_if(
	#[case] show: bool,
	#[case] overrides: &str,
	#[case] expected: &str,
) -> PaletteResult<()> {
	let mut registry = Registry::new();
	let source = format!(
		"{}{}{overrides}{}",
		concat!(
			r#"{% palette_component "heading" %}"#,
			r"{% if show %}<h5>{% palette_block header %}{{ title }}{% endpalette_block %}</h5>{% endif %}",
			r"{% endpalette_component %}",
		),
		r#"{% palette_ui component="heading" title="Hi" %}"#,
		"{% endpalette_ui %}",
	);
	let html = engine().render_str(&source, &mut registry, &Context::new().with("show", show))?;

	assert_eq!(html, expected);

	Ok(())
}

#[test]
fn override_reads_loop_variables() -> PaletteResult<()> {
	let context = Context::new().with("letters", vec!["a", "b"]);
	let html = render_page(
		concat!(
			r#"{% for letter in letters %}{% palette_ui component="bracket" %}"#,
			r"{% palette_override body %}{{ letter }}{{ loop.index }}{% endpalette_override %}",
			r"{% endpalette_ui %}{% endfor %}",
		),
		&context,
	)?;

	insta::assert_snapshot!(html, @"[a1][b2]");

	Ok(())
}

#[test]
fn override_reads_component_loop_variables() -> PaletteResult<()> {
	let mut registry = Registry::new();
	let html = engine().render_str(
		concat!(
			r#"{% palette_component "list" %}<ul>{% for item in items %}"#,
			r"<li>{% palette_block row %}{{ item }}{% endpalette_block %}</li>",
			r"{% endfor %}</ul>{% endpalette_component %}",
			r#"{% palette_ui component="list" %}"#,
			r"{% palette_override row %}<b>{{ item }}</b>{% endpalette_override %}",
			r"{% endpalette_ui %}",
		),
		&mut registry,
		&Context::new().with("items", vec!["x", "y"]),
	)?;

	insta::assert_snapshot!(html, @"<ul><li><b>x</b></li><li><b>y</b></li></ul>");

	Ok(())
}

#[test]
fn render_quoted_argument_with_tags() -> PaletteResult<()> {
	let html = render_page(
		r#"{% palette_ui component="card" title="{% if yes %}A{% endif %}" content="B" %}{% endpalette_ui %}"#,
		&Context::new().with("yes", true),
	)?;

	insta::assert_snapshot!(html, @"<h5>A</h5><p>B</p>");

	Ok(())
}

#[test]
fn render_reuses_compiled_templates() -> PaletteResult<()> {
	let engine = engine();
	let mut registry = registry()?;
	let context = Context::new().with("items", vec!["a", "b", "c"]);
	let source = concat!(
		r#"{% for item in items %}{% palette_ui component="card" title=item %}"#,
		r"{% palette_override body %}{{ loop.index }}{% endpalette_override %}",
		r"{% endpalette_ui %}{% endfor %}",
	);

	let first = engine.render_str(source, &mut registry, &context)?;
	let cached = engine.cached_templates();
	let second = engine.render_str(source, &mut registry, &context)?;

	assert_eq!(first, second);
	assert_eq!(first, "<h5>a</h5>1<h5>b</h5>2<h5>c</h5>3");
	assert_eq!(engine.cached_templates(), cached);

	Ok(())
}

#[test]
fn render_without_autoescape() -> PaletteResult<()> {
	let engine = Engine::new(RenderOptions {
		autoescape: false,
		..RenderOptions::default()
	});
	let mut registry = Registry::new();
	let html = engine.render_str("{{ value }}", &mut registry, &Context::new().with("value", "<b>"))?;

	assert_eq!(html, "<b>");

	Ok(())
}

#[test]
fn render_strict_undefined() {
	let engine = Engine::new(RenderOptions {
		undefined: UndefinedMode::Strict,
		..RenderOptions::default()
	});
	let mut registry = Registry::new();
	let result = engine.render_str("{{ missing }}", &mut registry, &Context::new());

	assert!(matches!(result, Err(PaletteError::TemplateRender(_))));
}

#[test]
fn invoke_with_overrides() -> PaletteResult<()> {
	let registry = registry()?;
	let invocation = Invocation::new("card")
		.with_context("title", "Hi")
		.with_context("content", "World")
		.with_override("header", "<h1>{{ block.super }}</h1>");

	let html = engine().invoke(&registry, &invocation, &Context::new())?;

	assert_eq!(html, "<h1><h5>Hi</h5></h1><p>World</p>");

	Ok(())
}

#[test]
fn context_layers() {
	let mut context = Context::new().with("title", "Page");
	assert_eq!(context.depth(), 1);

	context.push([("title".to_string(), minijinja::Value::from("Card"))].into());
	assert_eq!(context.get("title").map(ToString::to_string).as_deref(), Some("Card"));

	assert!(context.pop().is_some());
	assert!(context.pop().is_none());
	assert_eq!(context.get("title").map(ToString::to_string).as_deref(), Some("Page"));
}

#[test]
fn context_from_serialize() -> PaletteResult<()> {
	let context = Context::from_serialize(&json!({ "title": "Hi" }))?;
	assert_eq!(context.get("title").map(ToString::to_string).as_deref(), Some("Hi"));

	let error = Context::from_serialize(&json!([1, 2]));
	assert!(matches!(
		error,
		Err(PaletteError::ContextNotMap { ref kind }) if kind == "array"
	));

	Ok(())
}

#[test]
fn admin_fields_in_declaration_order() -> PaletteResult<()> {
	let fields = admin_fields(&article())?;
	let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();

	assert_eq!(names, vec!["title", "is_published", "summary", "views"]);
	assert_eq!(fields[3].1, json!(5));
	assert!(admin_fields(&Option::<Article>::None)?.is_empty());
	assert!(matches!(
		admin_fields(&5),
		Err(PaletteError::NotARecord { ref kind }) if kind == "number"
	));

	Ok(())
}

#[test]
fn admin_field_lookup() -> PaletteResult<()> {
	assert_eq!(admin_field(&article(), "title")?, json!("Hello"));
	assert_eq!(admin_field(&article(), "summary")?, serde_json::Value::Null);
	assert!(matches!(
		admin_field(&article(), "author"),
		Err(PaletteError::FieldNotFound { ref field }) if field == "author"
	));

	Ok(())
}

#[rstest]
#[case::snake_case("first_name", "First Name")]
#[case::single_word("title", "Title")]
#[case::mixed_case("iS_puBLISHED", "Is Published")]
#[case::extra_underscores("_created__at_", "Created At")]
#[case::empty("", "")]
fn humanize_names(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(humanize_name(input), expected);
}

#[rstest]
#[case::null(json!(null), FieldDisplay::Html(r#"<span class="text-muted">—</span>"#))]
#[case::empty_string(json!(""), FieldDisplay::Html(r#"<span class="text-muted">—</span>"#))]
#[case::text(json!("Hello"), FieldDisplay::Text("Hello".into()))]
#[case::number(json!(5), FieldDisplay::Text("5".into()))]
#[case::truthy(json!(true), FieldDisplay::Html(r#"<i class="bi bi-check-circle-fill" style="color: #28a745; font-size: 1.2em;"></i>"#))]
#[case::falsy(json!(false), FieldDisplay::Html(r#"<i class="bi bi-x-circle-fill" style="color: #dc3545; font-size: 1.2em;"></i>"#))]
fn format_field_values(#[case] value: serde_json::Value, #[case] expected: FieldDisplay) {
	assert_eq!(format_field_value(&value), expected);
}

#[test]
fn field_filters_in_templates() -> PaletteResult<()> {
	let context = Context::from_serialize(&json!({ "record": article() }))?;
	let mut registry = Registry::new();
	let html = engine().render_str(
		"{% for name, value in record|admin_fields %}{{ name|humanize_name }}={{ value|format_field_value }};{% endfor %}",
		&mut registry,
		&context,
	)?;

	assert!(html.starts_with("Title=Hello;Is Published=<i class=\"bi bi-check-circle-fill\""));
	assert!(html.ends_with(r#"Summary=<span class="text-muted">—</span>;Views=5;"#));

	Ok(())
}

#[test]
fn admin_field_filter_missing_field() {
	let context = json_context(json!({ "record": { "title": "Hi" } }));
	let mut registry = Registry::new();
	let ok = engine().render_str(r#"{{ record|admin_field("title") }}"#, &mut registry, &context);
	let missing = engine().render_str(r#"{{ record|admin_field("author") }}"#, &mut registry, &context);

	assert_eq!(ok.ok().as_deref(), Some("Hi"));
	assert!(matches!(missing, Err(PaletteError::TemplateRender(ref message)) if message.contains("author")));
}

#[test]
fn check_template_reports_problems() -> PaletteResult<()> {
	let registry = registry()?;
	let template = parse(concat!(
		r#"{% palette_ui component="missing" %}{% endpalette_ui %}"#,
		"\n",
		r#"{% palette_ui component="bracket" %}"#,
		r"{% palette_override footer %}{% endpalette_override %}",
		r"{% palette_override body %}{% endpalette_override %}",
		r"{% palette_override body %}{% endpalette_override %}",
		r"{% endpalette_ui %}",
		"\n",
		r#"{% palette_component "card" %}changed{% endpalette_component %}"#,
		"\n",
		r#"{% palette_ui component=dynamic %}{% endpalette_ui %}"#,
		r#"{% palette_ui component="lazy" file="lazy.html" %}{% endpalette_ui %}"#,
	))?;

	let kinds: Vec<DiagnosticKind> = check_template(&template, &registry)
		.into_iter()
		.map(|diagnostic| diagnostic.kind)
		.collect();

	assert_eq!(kinds, vec![
		DiagnosticKind::UndeclaredComponent,
		DiagnosticKind::UnknownOverride,
		DiagnosticKind::DuplicateOverride,
		DiagnosticKind::Redeclaration,
	]);

	Ok(())
}

#[test]
fn check_template_accepts_local_declarations() -> PaletteResult<()> {
	let template = parse(format!(
		"{CARD_COMPONENT}{}",
		r#"{% palette_ui component="card" %}{% palette_override header %}{% endpalette_override %}{% endpalette_ui %}"#
	))?;

	assert!(check_template(&template, &Registry::new()).is_empty());

	Ok(())
}

#[test]
fn file_system_loader() -> AnyEmptyResult {
	let first = tempfile::tempdir()?;
	let second = tempfile::tempdir()?;
	std::fs::create_dir_all(second.path().join("partials"))?;
	std::fs::write(second.path().join("partials/card.html"), CARD_COMPONENT)?;

	let loader = FileSystemLoader::new([first.path(), second.path()]);

	assert_eq!(loader.load("partials/card.html")?, CARD_COMPONENT);
	assert!(matches!(
		loader.load("partials/missing.html"),
		Err(PaletteError::TemplateNotFound { .. })
	));
	assert!(matches!(
		loader.load("../secrets.html"),
		Err(PaletteError::InvalidTemplatePath { .. })
	));
	assert!(matches!(
		loader.load("/etc/passwd"),
		Err(PaletteError::InvalidTemplatePath { .. })
	));

	Ok(())
}

#[test]
fn config_load_and_data() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("palette.toml"),
		r#"
[templates]
paths = ["templates"]

[render]
strict_overrides = true
undefined = "strict"

[data]
site = "site.json"
meta = "meta.yaml"
release = { path = "release", format = "toml" }
"#,
	)?;
	std::fs::write(tmp.path().join("site.json"), r#"{ "name": "Palette" }"#)?;
	std::fs::write(tmp.path().join("meta.yaml"), "tags:\n  - admin\n")?;
	std::fs::write(tmp.path().join("release"), "version = \"1.2.0\"\nbuild = 7\n")?;

	let Some(config) = PaletteConfig::load(tmp.path())? else {
		panic!("expected a config file");
	};

	let options = config.render_options();
	assert!(options.strict_overrides);
	assert!(options.autoescape);
	assert_eq!(options.undefined, UndefinedMode::Strict);
	assert_eq!(options.max_depth, 32);
	assert_eq!(config.template_roots(tmp.path()), vec![tmp.path().join("templates")]);

	let data = config.load_data(tmp.path())?;
	assert_eq!(data["site"], json!({ "name": "Palette" }));
	assert_eq!(data["meta"], json!({ "tags": ["admin"] }));
	assert_eq!(data["release"], json!({ "version": "1.2.0", "build": 7 }));

	Ok(())
}

#[test]
fn config_discovery_candidates() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	assert!(PaletteConfig::load(tmp.path())?.is_none());

	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(tmp.path().join(".config/palette.toml"), "[render]\nmax_depth = 4\n")?;
	let Some(config) = PaletteConfig::load(tmp.path())? else {
		panic!("expected a config file");
	};

	assert_eq!(config.render.max_depth, 4);
	assert_eq!(config.include_patterns(), vec![DEFAULT_TEMPLATE_PATTERN.to_string()]);

	Ok(())
}

#[rstest]
#[case::invalid_toml("[render", "palette::config_parse")]
#[case::unknown_undefined_mode("[render]\nundefined = \"loud\"\n", "palette::config_parse")]
fn config_parse_errors(#[case] content: &str, #[case] code: &str) {
	let Err(error) = PaletteConfig::parse(content) else {
		panic!("expected `{content}` to fail");
	};

	let actual = miette::Diagnostic::code(&error).map(|code| code.to_string());
	assert_eq!(actual.as_deref(), Some(code));
}

#[test]
fn config_unsupported_data_format() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("palette.toml"), "[data]\nsite = \"site.ini\"\n")?;
	std::fs::write(tmp.path().join("site.ini"), "name = palette\n")?;

	let Some(config) = PaletteConfig::load(tmp.path())? else {
		panic!("expected a config file");
	};

	assert!(matches!(
		config.load_data(tmp.path()),
		Err(PaletteError::UnsupportedDataFormat(ref format)) if format == "ini"
	));

	Ok(())
}

#[test]
fn scan_project_registers_and_checks() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let templates = tmp.path().join("templates");
	std::fs::create_dir_all(templates.join("pages"))?;
	std::fs::write(templates.join("components.html"), CARD_COMPONENT)?;
	std::fs::write(
		templates.join("pages/index.html"),
		r#"{% palette_ui component="card" %}{% palette_override footer %}{% endpalette_override %}{% endpalette_ui %}"#,
	)?;
	std::fs::write(templates.join("pages/broken.html"), "{% palette_block header %}")?;
	std::fs::write(templates.join("notes.txt"), "{% palette_block header %}")?;

	let config = PaletteConfig::parse("[templates]\npaths = [\"templates\"]\n")?;
	let project = scan_project(tmp.path(), &config)?;

	assert_eq!(project.templates.len(), 2);
	assert_eq!(project.failures.len(), 1);
	assert_eq!(project.registry.names(), vec!["card"]);
	assert_eq!(
		project.registry.lookup("card")?.origin.as_deref(),
		Some("templates/components.html")
	);

	let report = project.check();
	assert_eq!(report.len(), 1);
	assert_eq!(report[0].0, templates.join("pages/index.html"));
	assert_eq!(report[0].1[0].kind, DiagnosticKind::UnknownOverride);

	Ok(())
}
