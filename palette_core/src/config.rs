use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::FileSystemLoader;
use crate::PaletteError;
use crate::PaletteResult;
use crate::RenderOptions;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["palette.toml", ".palette.toml", ".config/palette.toml"];

/// The glob used to find templates when `[templates] include` is empty.
pub const DEFAULT_TEMPLATE_PATTERN: &str = "**/*.html";

/// Data source entry for a `[data]` namespace.
///
/// ```toml
/// [data]
/// site = "site.json"
/// release = { path = "release-info", format = "yaml" }
/// ```
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum DataSource {
	Path(PathBuf),
	Typed(TypedDataSource),
}

impl DataSource {
	pub fn path(&self) -> &Path {
		match self {
			Self::Path(path) => path.as_path(),
			Self::Typed(typed) => typed.path.as_path(),
		}
	}

	/// The explicit format, or the file extension.
	pub fn format(&self) -> String {
		match self {
			Self::Path(path) => {
				path.extension()
					.and_then(|extension| extension.to_str())
					.unwrap_or_default()
					.to_ascii_lowercase()
			}
			Self::Typed(typed) => typed.format.trim().to_ascii_lowercase(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct TypedDataSource {
	pub path: PathBuf,
	pub format: String,
}

/// Configuration loaded from a `palette.toml` file.
///
/// ```toml
/// [templates]
/// paths = ["templates"]
/// include = ["**/*.html"]
///
/// [render]
/// autoescape = true
/// undefined = "lenient"
/// strict_overrides = false
/// max_depth = 32
///
/// [data]
/// site = "site.json"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct PaletteConfig {
	#[serde(default)]
	pub templates: TemplatesConfig,
	#[serde(default)]
	pub render: RenderOptions,
	/// Map of namespace name to data file, exposed to templates as
	/// `{{ namespace.* }}`.
	#[serde(default)]
	pub data: BTreeMap<String, DataSource>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplatesConfig {
	/// Directories searched for `file=` templates, relative to the project
	/// root. The root itself is used when empty.
	#[serde(default)]
	pub paths: Vec<PathBuf>,
	/// Glob patterns selecting the templates that `palette check` scans.
	#[serde(default)]
	pub include: Vec<String>,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
}

impl PaletteConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> PaletteResult<Option<PaletteConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		tracing::debug!(path = %config_path.display(), "loading config");
		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;

		Ok(Some(config))
	}

	pub fn parse(content: &str) -> PaletteResult<PaletteConfig> {
		toml::from_str(content).map_err(|e| PaletteError::ConfigParse(e.to_string()))
	}

	pub fn render_options(&self) -> RenderOptions {
		self.render
	}

	/// Absolute template directories for `root`.
	pub fn template_roots(&self, root: &Path) -> Vec<PathBuf> {
		if self.templates.paths.is_empty() {
			return vec![root.to_path_buf()];
		}

		self.templates
			.paths
			.iter()
			.map(|path| root.join(path))
			.collect()
	}

	pub fn loader(&self, root: &Path) -> FileSystemLoader {
		FileSystemLoader::new(self.template_roots(root))
	}

	/// The include patterns, falling back to [`DEFAULT_TEMPLATE_PATTERN`].
	pub fn include_patterns(&self) -> Vec<String> {
		if self.templates.include.is_empty() {
			vec![DEFAULT_TEMPLATE_PATTERN.to_string()]
		} else {
			self.templates.include.clone()
		}
	}

	/// Read each data file and parse it into a `serde_json::Value` keyed by
	/// namespace.
	pub fn load_data(&self, root: &Path) -> PaletteResult<BTreeMap<String, serde_json::Value>> {
		let mut data = BTreeMap::new();

		for (namespace, source) in &self.data {
			let value = load_data_file(&root.join(source.path()), &source.format())?;
			data.insert(namespace.clone(), value);
		}

		Ok(data)
	}
}

/// Read and parse a data file, picking the parser from `format` (`json`,
/// `toml`, `yaml` or `yml`).
pub fn load_data_file(path: &Path, format: &str) -> PaletteResult<serde_json::Value> {
	let path_display = path.display().to_string();
	let content = std::fs::read_to_string(path).map_err(|e| {
		PaletteError::DataFile {
			path: path_display.clone(),
			reason: e.to_string(),
		}
	})?;

	parse_data_file(&content, format, &path_display)
}

/// Parse a data file's content into a `serde_json::Value` based on its
/// format.
fn parse_data_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> PaletteResult<serde_json::Value> {
	let data_error = |reason: String| {
		PaletteError::DataFile {
			path: path_display.to_string(),
			reason,
		}
	};

	match format {
		"json" => serde_json::from_str(content).map_err(|e| data_error(e.to_string())),
		"toml" => {
			let toml_value: toml::Value =
				toml::from_str(content).map_err(|e| data_error(e.to_string()))?;
			toml_to_json(toml_value).map_err(data_error)
		}
		"yaml" | "yml" => serde_yaml_ng::from_str(content).map_err(|e| data_error(e.to_string())),
		other => Err(PaletteError::UnsupportedDataFormat(other.to_string())),
	}
}

fn toml_to_json(value: toml::Value) -> Result<serde_json::Value, String> {
	let json = match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::Number(i.into()),
		toml::Value::Float(f) => {
			serde_json::Value::Number(
				serde_json::Number::from_f64(f)
					.ok_or_else(|| format!("`{f}` cannot be represented in JSON"))?,
			)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(arr) => {
			serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect::<Result<_, _>>()?)
		}
		toml::Value::Table(table) => {
			let mut map = serde_json::Map::new();
			for (k, v) in table {
				map.insert(k, toml_to_json(v)?);
			}
			serde_json::Value::Object(map)
		}
	};

	Ok(json)
}
