use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::ComponentDefinition;
use crate::PaletteConfig;
use crate::PaletteError;
use crate::PaletteResult;
use crate::Registry;
use crate::Template;
use crate::TemplateDiagnostic;
use crate::check_template;
use crate::parse_named;

/// A template file found while scanning a project.
#[derive(Debug, Clone)]
pub struct TemplateFile {
	pub path: PathBuf,
	pub template: Template,
}

/// A template file that failed to parse.
#[derive(Debug)]
pub struct ParseFailure {
	pub path: PathBuf,
	pub error: PaletteError,
}

/// Every template under a project's template roots, with their declarations
/// registered.
#[derive(Debug)]
pub struct Project {
	pub root: PathBuf,
	pub templates: Vec<TemplateFile>,
	pub failures: Vec<ParseFailure>,
	pub registry: Registry,
}

impl Project {
	/// Static diagnostics for every template, grouped by file.
	pub fn check(&self) -> Vec<(PathBuf, Vec<TemplateDiagnostic>)> {
		self.templates
			.iter()
			.map(|file| (file.path.clone(), check_template(&file.template, &self.registry)))
			.filter(|(_, diagnostics)| !diagnostics.is_empty())
			.collect()
	}
}

/// Scan the template roots configured for `root` and register every
/// declared component. Templates are visited in path order, so when two
/// files declare the same component the later path wins.
pub fn scan_project(root: &Path, config: &PaletteConfig) -> PaletteResult<Project> {
	let include_set = build_glob_set(&config.include_patterns())?;
	let gitignore = if config.templates.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};

	let mut paths = vec![];
	for template_root in config.template_roots(root) {
		collect_template_files(&template_root, &template_root, &include_set, &gitignore, &mut paths)?;
	}
	paths.sort();
	paths.dedup();

	let mut project = Project {
		root: root.to_path_buf(),
		templates: vec![],
		failures: vec![],
		registry: Registry::new(),
	};

	for path in paths {
		let name = path
			.strip_prefix(root)
			.unwrap_or(&path)
			.to_string_lossy()
			.replace('\\', "/");
		let content = std::fs::read_to_string(&path)?;

		match parse_named(name, content) {
			Ok(template) => {
				for declaration in template.components() {
					project
						.registry
						.register(ComponentDefinition::from_declaration(declaration, template.name.as_deref()));
				}
				project.templates.push(TemplateFile { path, template });
			}
			Err(error) => {
				tracing::debug!(path = %path.display(), %error, "template failed to parse");
				project.failures.push(ParseFailure { path, error });
			}
		}
	}

	tracing::debug!(
		templates = project.templates.len(),
		components = project.registry.len(),
		"project scanned",
	);

	Ok(project)
}

/// Build a `GlobSet` from a list of glob pattern strings.
fn build_glob_set(patterns: &[String]) -> PaletteResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			PaletteError::ConfigParse(format!("invalid include pattern `{pattern}`: {e}"))
		})?;
		builder.add(glob);
	}

	builder
		.build()
		.map_err(|e| PaletteError::ConfigParse(format!("failed to build include patterns: {e}")))
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		let _ = builder.add(gitignore_path);
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

/// Recursively collect files under `dir` matching the include patterns,
/// relative to `base`.
fn collect_template_files(
	base: &Path,
	dir: &Path,
	include_set: &GlobSet,
	gitignore: &Gitignore,
	files: &mut Vec<PathBuf>,
) -> PaletteResult<()> {
	if !dir.is_dir() {
		return Ok(());
	}

	for entry in std::fs::read_dir(dir)? {
		let path = entry?.path();

		if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
			if is_ignored_directory_name(name) {
				continue;
			}
		}

		let is_dir = path.is_dir();
		if gitignore.matched(&path, is_dir).is_ignore() {
			continue;
		}

		if is_dir {
			collect_template_files(base, &path, include_set, gitignore, files)?;
		} else if let Ok(relative) = path.strip_prefix(base) {
			if include_set.is_match(relative) {
				files.push(path);
			}
		}
	}

	Ok(())
}
