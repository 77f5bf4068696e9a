use std::collections::HashMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::PaletteError;
use crate::PaletteResult;

/// Fetches template source by name for `file=` arguments.
pub trait TemplateLoader: Send + Sync {
	fn load(&self, name: &str) -> PaletteResult<String>;
}

/// Loads templates from a list of directories, searched in order.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
	roots: Vec<PathBuf>,
}

impl FileSystemLoader {
	pub fn new<I, P>(roots: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		Self {
			roots: roots.into_iter().map(Into::into).collect(),
		}
	}

	/// The first existing file for `name` under the configured roots.
	pub fn resolve(&self, name: &str) -> PaletteResult<PathBuf> {
		let relative = Path::new(name);
		let is_safe = !name.is_empty()
			&& relative
				.components()
				.all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

		if !is_safe {
			return Err(PaletteError::InvalidTemplatePath {
				name: name.to_string(),
			});
		}

		self.roots
			.iter()
			.map(|root| root.join(relative))
			.find(|path| path.is_file())
			.ok_or_else(|| {
				PaletteError::TemplateNotFound {
					name: name.to_string(),
				}
			})
	}
}

impl TemplateLoader for FileSystemLoader {
	fn load(&self, name: &str) -> PaletteResult<String> {
		let path = self.resolve(name)?;
		tracing::debug!(path = %path.display(), "reading template");
		Ok(std::fs::read_to_string(path)?)
	}
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
	templates: HashMap<String, String>,
}

impl MemoryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
		self.insert(name, source);
		self
	}

	pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
		self.templates.insert(name.into(), source.into());
	}
}

impl TemplateLoader for MemoryLoader {
	fn load(&self, name: &str) -> PaletteResult<String> {
		self.templates.get(name).cloned().ok_or_else(|| {
			PaletteError::TemplateNotFound {
				name: name.to_string(),
			}
		})
	}
}
