use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::Display;

use serde::Serialize;

use crate::ComponentDefinition;
use crate::Position;
use crate::Registry;
use crate::Template;

/// What a [`TemplateDiagnostic`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiagnosticKind {
	/// A literal component name that is neither registered nor declared in the
	/// template.
	UndeclaredComponent,
	/// An override naming a block the component does not have.
	UnknownOverride,
	/// The same block overridden twice in one invocation.
	DuplicateOverride,
	/// A declaration that replaces a registered component with a different
	/// body.
	Redeclaration,
}

impl Display for DiagnosticKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::UndeclaredComponent => "undeclared component",
			Self::UnknownOverride => "unknown override",
			Self::DuplicateOverride => "duplicate override",
			Self::Redeclaration => "redeclaration",
		};

		write!(f, "{label}")
	}
}

/// A problem found without rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateDiagnostic {
	pub kind: DiagnosticKind,
	pub message: String,
	pub line: usize,
	pub column: usize,
}

impl TemplateDiagnostic {
	fn new(kind: DiagnosticKind, message: String, position: Position) -> Self {
		Self {
			kind,
			message,
			line: position.line,
			column: position.column,
		}
	}
}

impl Display for TemplateDiagnostic {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}: {}", self.line, self.column, self.message)
	}
}

/// Report problems in `template` against the components in `registry` and
/// those the template declares itself. Invocations whose component name is
/// only known at render time are skipped.
pub fn check_template(template: &Template, registry: &Registry) -> Vec<TemplateDiagnostic> {
	let mut diagnostics = vec![];
	let mut local: HashMap<&str, ComponentDefinition> = HashMap::new();

	for declaration in template.components() {
		let definition = ComponentDefinition::from_declaration(declaration, template.name.as_deref());

		if let Some(existing) = registry.get(&declaration.name) {
			if existing.nodes != definition.nodes {
				diagnostics.push(TemplateDiagnostic::new(
					DiagnosticKind::Redeclaration,
					format!(
						"component `{}` is already declared in {} with a different body",
						declaration.name,
						existing.origin.as_deref().unwrap_or("another template"),
					),
					declaration.position,
				));
			}
		}

		local.insert(&declaration.name, definition);
	}

	for invocation in template.invocations() {
		let mut seen = HashSet::new();
		for item in &invocation.overrides {
			if !seen.insert(item.name.as_str()) {
				diagnostics.push(TemplateDiagnostic::new(
					DiagnosticKind::DuplicateOverride,
					format!("block `{}` is overridden more than once", item.name),
					item.position,
				));
			}
		}

		let Some(name) = invocation.component.as_literal() else {
			continue;
		};

		let registered = registry.get(name);
		let definition = local.get(name).or(registered.as_deref());

		let Some(definition) = definition else {
			// Loaded on demand.
			if invocation.file.is_some() {
				continue;
			}

			diagnostics.push(TemplateDiagnostic::new(
				DiagnosticKind::UndeclaredComponent,
				format!("component `{name}` was never declared"),
				invocation.position,
			));
			continue;
		};

		for item in &invocation.overrides {
			if !definition.has_block(&item.name) {
				diagnostics.push(TemplateDiagnostic::new(
					DiagnosticKind::UnknownOverride,
					format!("component `{name}` has no block named `{}`", item.name),
					item.position,
				));
			}
		}
	}

	diagnostics.sort_by_key(|diagnostic| (diagnostic.line, diagnostic.column));
	diagnostics
}
