use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum PaletteError {
	#[error(transparent)]
	#[diagnostic(code(palette::io_error))]
	Io(#[from] std::io::Error),

	#[error("syntax error at {line}:{column}: {message}")]
	#[diagnostic(code(palette::syntax))]
	Syntax {
		message: String,
		line: usize,
		column: usize,
	},

	#[error("missing closing tag for `{tag}` opened at {line}:{column}")]
	#[diagnostic(
		code(palette::unclosed_tag),
		help("add `{{% end{tag} %}}` to close this tag")
	)]
	UnclosedTag {
		tag: String,
		line: usize,
		column: usize,
	},

	#[error("unexpected closing tag `{tag}` at {line}:{column}")]
	#[diagnostic(code(palette::unexpected_closing_tag))]
	UnexpectedClosingTag {
		tag: String,
		line: usize,
		column: usize,
	},

	#[error("`palette_block {name}` at {line}:{column} is not inside a component declaration")]
	#[diagnostic(
		code(palette::block_outside_component),
		help("wrap the block in `{{% palette_component \"name\" %}}...{{% endpalette_component %}}`")
	)]
	BlockOutsideComponent {
		name: String,
		line: usize,
		column: usize,
	},

	#[error("`palette_override {name}` at {line}:{column} is not directly inside `palette_ui`")]
	#[diagnostic(code(palette::override_outside_invocation))]
	OverrideOutsideInvocation {
		name: String,
		line: usize,
		column: usize,
	},

	#[error("`{tag}` at {line}:{column} requires the `{argument}` argument")]
	#[diagnostic(code(palette::missing_argument))]
	MissingArgument {
		tag: String,
		argument: String,
		line: usize,
		column: usize,
	},

	#[error("block `{block}` is declared more than once in component `{component}`")]
	#[diagnostic(
		code(palette::duplicate_block),
		help("block names must be unique within a component")
	)]
	DuplicateBlock { component: String, block: String },

	#[error("component `{name}` was never declared")]
	#[diagnostic(
		code(palette::component_not_declared),
		help(
			"declare it with `{{% palette_component \"{name}\" %}}` or pass `file=` so it can be \
			 loaded"
		)
	)]
	ComponentNotDeclared { name: String },

	#[error("component `{component}` has no block named `{block}`")]
	#[diagnostic(
		code(palette::unknown_override),
		help("remove the override or disable `strict_overrides`")
	)]
	UnknownOverride { component: String, block: String },

	#[error("component cycle detected: {chain}")]
	#[diagnostic(code(palette::cyclic_component))]
	CyclicComponent { chain: String },

	#[error("component nesting exceeded the limit of {limit}")]
	#[diagnostic(
		code(palette::recursion_limit),
		help("raise `max_depth` in palette.toml if the nesting is intentional")
	)]
	RecursionLimit { limit: usize },

	#[error("template `{name}` not found")]
	#[diagnostic(
		code(palette::template_not_found),
		help("add the directory that contains it to `[templates] paths`")
	)]
	TemplateNotFound { name: String },

	#[error("invalid template path `{name}`")]
	#[diagnostic(
		code(palette::invalid_template_path),
		help("template names must be relative and may not contain `..`")
	)]
	InvalidTemplatePath { name: String },

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(palette::template_render))]
	TemplateRender(String),

	#[error("field `{field}` not found")]
	#[diagnostic(code(palette::field_not_found))]
	FieldNotFound { field: String },

	#[error("expected a record with named fields, got {kind}")]
	#[diagnostic(code(palette::not_a_record))]
	NotARecord { kind: String },

	#[error("render context must be a map, got {kind}")]
	#[diagnostic(code(palette::context_not_map))]
	ContextNotMap { kind: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(palette::config_parse),
		help("check that palette.toml is valid TOML with [templates], [render] and/or [data] sections")
	)]
	ConfigParse(String),

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(palette::data_file))]
	DataFile { path: String, reason: String },

	#[error("unsupported data file format: `{0}`")]
	#[diagnostic(
		code(palette::unsupported_format),
		help("supported formats: json, toml, yaml, yml")
	)]
	UnsupportedDataFormat(String),
}

impl From<minijinja::Error> for PaletteError {
	fn from(error: minijinja::Error) -> Self {
		Self::TemplateRender(error.to_string())
	}
}

pub type PaletteResult<T> = Result<T, PaletteError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
