use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use palette_cli::Commands;
use palette_cli::OutputFormat;
use palette_cli::PaletteCli;
use palette_core::ComponentDefinition;
use palette_core::Context;
use palette_core::Engine;
use palette_core::PaletteConfig;
use palette_core::PaletteError;
use palette_core::PaletteResult;
use palette_core::Template;
use palette_core::TemplateDiagnostic;
use palette_core::check_template;
use palette_core::config::load_data_file;
use palette_core::parse_named;
use palette_core::project::Project;
use palette_core::project::scan_project;
use tracing_subscriber::EnvFilter;

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
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

const SAMPLE_CONFIG: &str = r#"# palette configuration

[templates]
# Directories searched for templates and `file=` arguments.
paths = ["templates"]

[render]
autoescape = true
# lenient | chainable | strict
undefined = "lenient"
strict_overrides = false

# Map data files to template namespaces.
# Values from these files are available as {{ namespace.key }}.
# [data]
# site = "site.json"
"#;

const SAMPLE_COMPONENT: &str = r#"{% palette_component "card" %}
<div class="card">
  <div class="card-header">{% palette_block header %}{{ title }}{% endpalette_block %}</div>
  <div class="card-body">{% palette_block body %}{{ content }}{% endpalette_block %}</div>
</div>
{% endpalette_component %}
"#;

fn main() {
	let args = PaletteCli::parse();

	// Respect NO_COLOR env var, --no-color flag and terminals without color.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Render {
			template,
			data,
			strict_overrides,
		}) => run_render(&args, template, data, *strict_overrides),
		Some(Commands::Check { templates, format }) => {
			run_check(&args, templates, *format).map(|failed| {
				if failed {
					process::exit(1);
				}
			})
		}
		Some(Commands::List { templates }) => run_list(&args, templates),
		None => {
			eprintln!("No subcommand specified. Run `palette --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Render through miette for error codes and help text.
		match e.downcast::<PaletteError>() {
			Ok(palette_err) => {
				let report: miette::Report = (*palette_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Library logs go to stderr. `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("palette_core={level},palette={level}")));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.init();
}

fn resolve_root(args: &PaletteCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(root: &Path) -> PaletteResult<PaletteConfig> {
	Ok(PaletteConfig::load(root)?.unwrap_or_default())
}

fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
		.replace('\\', "/")
}

fn resolve_file(root: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() {
		path.to_path_buf()
	} else {
		root.join(path)
	}
}

fn read_template(root: &Path, path: &Path) -> PaletteResult<Template> {
	let content = std::fs::read_to_string(path).map_err(|_| {
		PaletteError::TemplateNotFound {
			name: path.display().to_string(),
		}
	})?;

	parse_named(make_relative(path, root), content)
}

fn run_init(args: &PaletteCli) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config_path = root.join("palette.toml");
	let template_path = root.join("templates").join("components.html");

	if config_path.exists() || PaletteConfig::resolve_path(&root).is_some() {
		println!("Config file already exists.");
	} else {
		std::fs::write(&config_path, SAMPLE_CONFIG)?;
		println!("Created palette.toml");
	}

	let template_exists = template_path.exists();
	if template_exists {
		println!("Template file already exists: {}", template_path.display());
	} else {
		if let Some(parent) = template_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&template_path, SAMPLE_COMPONENT)?;
		println!("Created template file: {}", template_path.display());
	}

	if !template_exists {
		println!();
		println!("Next steps:");
		println!("  1. Invoke the card in a page:");
		println!("     {{% palette_ui component=\"card\" title=\"Hello\" %}}");
		println!("       {{% palette_override body %}}...{{% endpalette_override %}}");
		println!("     {{% endpalette_ui %}}");
		println!("  2. Run `palette render <page>` to see the result");
	}

	Ok(())
}

fn run_render(
	args: &PaletteCli,
	name: &str,
	data: &[PathBuf],
	strict_overrides: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let loader = config.loader(&root);

	let path = loader
		.resolve(name)
		.unwrap_or_else(|_| resolve_file(&root, Path::new(name)));
	let template = read_template(&root, &path)?;

	let project = scan_project(&root, &config)?;
	let mut registry = project.registry;

	let mut context = Context::from_serialize(&config.load_data(&root)?)?;
	for file in data {
		let file = resolve_file(&root, file);
		let format = file
			.extension()
			.and_then(|e| e.to_str())
			.unwrap_or_default()
			.to_ascii_lowercase();
		let value = load_data_file(&file, &format)?;
		context.extend(&Context::from_serialize(&value)?);
	}

	let mut options = config.render_options();
	options.strict_overrides |= strict_overrides;
	let engine = Engine::new(options).with_loader(loader);

	let html = engine.render(&template, &mut registry, &context)?;
	print!("{html}");

	Ok(())
}

/// A checked template: its diagnostics or the error that stopped it from
/// parsing.
struct CheckEntry {
	file: String,
	outcome: Result<Vec<TemplateDiagnostic>, PaletteError>,
}

fn collect_check_entries(
	root: &Path,
	project: Project,
	templates: &[PathBuf],
) -> Vec<CheckEntry> {
	if !templates.is_empty() {
		return templates
			.iter()
			.map(|path| {
				let path = resolve_file(root, path);
				CheckEntry {
					file: make_relative(&path, root),
					outcome: read_template(root, &path)
						.map(|template| check_template(&template, &project.registry)),
				}
			})
			.collect();
	}

	let mut entries: Vec<CheckEntry> = project
		.templates
		.iter()
		.map(|file| {
			CheckEntry {
				file: make_relative(&file.path, root),
				outcome: Ok(check_template(&file.template, &project.registry)),
			}
		})
		.collect();
	entries.extend(project.failures.into_iter().map(|failure| {
		CheckEntry {
			file: make_relative(&failure.path, root),
			outcome: Err(failure.error),
		}
	}));
	entries.sort_by(|a, b| a.file.cmp(&b.file));

	entries
}

/// Returns `true` when problems were found.
fn run_check(
	args: &PaletteCli,
	templates: &[PathBuf],
	format: OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let project = scan_project(&root, &config)?;
	let component_count = project.registry.len();
	let entries = collect_check_entries(&root, project, templates);

	let failed = entries.iter().any(|entry| {
		match &entry.outcome {
			Ok(diagnostics) => !diagnostics.is_empty(),
			Err(_) => true,
		}
	});

	match format {
		OutputFormat::Json => {
			let mut diagnostics = vec![];
			let mut errors = vec![];
			for entry in &entries {
				match &entry.outcome {
					Ok(found) => {
						diagnostics.extend(found.iter().map(|diagnostic| {
							serde_json::json!({
								"file": entry.file,
								"line": diagnostic.line,
								"column": diagnostic.column,
								"kind": diagnostic.kind,
								"message": diagnostic.message,
							})
						}));
					}
					Err(error) => {
						errors.push(serde_json::json!({
							"file": entry.file,
							"message": error.to_string(),
						}));
					}
				}
			}

			let output = serde_json::json!({
				"ok": !failed,
				"diagnostics": diagnostics,
				"errors": errors,
			});
			println!("{output}");
		}
		OutputFormat::Text if !failed => {
			println!(
				"Check passed: {} template(s), {component_count} component(s).",
				entries.len()
			);
		}
		OutputFormat::Text => {
			eprintln!("Check failed.");
			let mut problem_count = 0;

			for entry in &entries {
				match &entry.outcome {
					Ok(diagnostics) => {
						for diagnostic in diagnostics {
							problem_count += 1;
							eprintln!(
								"  {} {}:{}: {}",
								colored!(format!("{}:", diagnostic.kind), yellow),
								entry.file,
								diagnostic.line,
								diagnostic.column,
							);
							eprintln!("    {}", diagnostic.message);
						}
					}
					Err(error) => {
						problem_count += 1;
						eprintln!("  {} {}: {error}", colored!("error:", red), entry.file);
					}
				}
			}

			eprintln!();
			eprintln!("{problem_count} problem(s) found.");
		}
	}

	Ok(failed)
}

fn run_list(args: &PaletteCli, templates: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root)?;

	let components: Vec<Arc<ComponentDefinition>> = if templates.is_empty() {
		let project = scan_project(&root, &config)?;
		for failure in &project.failures {
			eprintln!(
				"{} {}: {}",
				colored!("warning:", yellow),
				make_relative(&failure.path, &root),
				failure.error
			);
		}
		project
			.registry
			.names()
			.into_iter()
			.filter_map(|name| project.registry.get(name))
			.collect()
	} else {
		let mut components = vec![];
		for path in templates {
			let template = read_template(&root, &resolve_file(&root, path))?;
			components.extend(template.components().into_iter().map(|declaration| {
				Arc::new(ComponentDefinition::from_declaration(
					declaration,
					template.name.as_deref(),
				))
			}));
		}
		components
	};

	if components.is_empty() {
		println!("No components found.");
		return Ok(());
	}

	println!("{}", colored!("Components:", bold));
	for component in &components {
		let blocks = component.block_names().join(", ");
		let origin = component.origin.as_deref().unwrap_or_default();
		println!(
			"  {} [{blocks}] {origin}",
			colored!(component.name.as_str(), green)
		);
	}

	println!("\n{} component(s)", components.len());

	Ok(())
}
