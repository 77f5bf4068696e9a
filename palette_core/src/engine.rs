use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;

use minijinja::AutoEscape;
use minijinja::Environment;
use minijinja::Error;
use minijinja::ErrorKind;
use minijinja::State;
use minijinja::UndefinedBehavior;
use minijinja::Value;
use minijinja::value::Object;
use serde::Deserialize;
use serde::Serialize;

use crate::ComponentDefinition;
use crate::Context;
use crate::PaletteError;
use crate::PaletteResult;
use crate::Registry;
use crate::Template;
use crate::TemplateLoader;
use crate::compile::BLOCK_FUNCTION;
use crate::compile::Call;
use crate::compile::FRAME_KEY;
use crate::compile::RESERVED_PREFIX;
use crate::compile::UI_FUNCTION;
use crate::compile::Unit;
use crate::compile::lower;
use crate::fields::admin_field_filter;
use crate::fields::admin_fields_filter;
use crate::fields::format_field_value_filter;
use crate::fields::humanize_name_filter;
use crate::parse;
use crate::parse_named;

/// How variables missing from the context render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedMode {
	/// Missing variables render as an empty string.
	#[default]
	Lenient,
	/// Like `Lenient`, and attribute access on a missing value is also
	/// allowed.
	Chainable,
	/// Rendering a missing variable is an error.
	Strict,
}

impl From<UndefinedMode> for UndefinedBehavior {
	fn from(mode: UndefinedMode) -> Self {
		match mode {
			UndefinedMode::Lenient => Self::Lenient,
			UndefinedMode::Chainable => Self::Chainable,
			UndefinedMode::Strict => Self::Strict,
		}
	}
}

/// Options for an [`Engine`], also read from the `[render]` section of
/// `palette.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
	/// HTML-escape `{{ }}` output.
	pub autoescape: bool,
	pub undefined: UndefinedMode,
	/// Fail with [`PaletteError::UnknownOverride`] instead of warning when an
	/// override names a block the component does not declare.
	pub strict_overrides: bool,
	/// The deepest allowed nesting of render invocations.
	pub max_depth: usize,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			autoescape: true,
			undefined: UndefinedMode::default(),
			strict_overrides: false,
			max_depth: 32,
		}
	}
}

/// A programmatic render invocation: the equivalent of a `palette_ui` tag
/// built in code.
///
/// ```rust
/// use palette_core::Context;
/// use palette_core::Engine;
/// use palette_core::Invocation;
/// use palette_core::RenderOptions;
/// use palette_core::Registry;
///
/// let engine = Engine::new(RenderOptions::default());
/// let mut registry = Registry::new();
/// engine
/// 	.render_str(
/// 		r#"{% palette_component "card" %}<h5>{% palette_block header %}{{ title }}{% endpalette_block %}</h5>{% endpalette_component %}"#,
/// 		&mut registry,
/// 		&Context::new(),
/// 	)
/// 	.unwrap();
///
/// let invocation = Invocation::new("card").with_context("title", "Hi");
/// let html = engine.invoke(&registry, &invocation, &Context::new()).unwrap();
/// assert_eq!(html, "<h5>Hi</h5>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Invocation {
	pub component: String,
	pub context: Vec<(String, Value)>,
	/// `(block name, template source)` pairs.
	pub overrides: Vec<(String, String)>,
}

impl Invocation {
	pub fn new(component: impl Into<String>) -> Self {
		Self {
			component: component.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.context.push((key.into(), value.into()));
		self
	}

	#[must_use]
	pub fn with_override(mut self, block: impl Into<String>, source: impl Into<String>) -> Self {
		self.overrides.push((block.into(), source.into()));
		self
	}
}

/// Renders templates that declare and invoke components.
///
/// Every node list (a page, a component body, an override body) is lowered
/// into one minijinja template, so palette tags may sit inside `{% for %}`
/// and `{% if %}`. Compiled templates are cached for the life of the engine.
pub struct Engine {
	env: Environment<'static>,
	options: RenderOptions,
	loader: Option<Arc<dyn TemplateLoader>>,
	sources: Arc<SourceMap>,
}

impl Engine {
	pub fn new(options: RenderOptions) -> Self {
		let mut env = Environment::new();
		env.set_keep_trailing_newline(true);
		env.set_undefined_behavior(options.undefined.into());

		let autoescape = options.autoescape;
		env.set_auto_escape_callback(move |_| {
			if autoescape {
				AutoEscape::Html
			} else {
				AutoEscape::None
			}
		});

		let sources = Arc::new(SourceMap::default());
		let lowered = Arc::clone(&sources);
		env.set_loader(move |name| Ok(lowered.get(name)));

		env.add_function(UI_FUNCTION, ui_function);
		env.add_function(BLOCK_FUNCTION, block_function);
		env.add_filter("admin_fields", admin_fields_filter);
		env.add_filter("admin_field", admin_field_filter);
		env.add_filter("humanize_name", humanize_name_filter);
		env.add_filter("format_field_value", format_field_value_filter);

		Self {
			env,
			options,
			loader: None,
			sources,
		}
	}

	/// Use `loader` to fetch the templates named by `file=` arguments.
	#[must_use]
	pub fn with_loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
		self.loader = Some(Arc::new(loader));
		self
	}

	/// Register every component declared in `template`, including nested
	/// declarations. Returns the number of declarations.
	pub fn declare(&self, template: &Template, registry: &mut Registry) -> usize {
		let components = template.components();

		for declaration in &components {
			registry.register(ComponentDefinition::from_declaration(
				declaration,
				template.name.as_deref(),
			));
		}

		components.len()
	}

	/// Render a page. Its declarations are registered before any invocation
	/// resolves, so a component may be used above the place it is declared.
	/// Components loaded through `file=` are registered as well.
	pub fn render(
		&self,
		template: &Template,
		registry: &mut Registry,
		context: &Context,
	) -> PaletteResult<String> {
		self.declare(template, registry);

		let session = Session::new(self, registry.clone());
		let output = session.render_unit(&self.env, &lower(&template.nodes), context.clone(), None)?;

		let loaded = session.take_loaded();
		for name in loaded.names() {
			if let Some(definition) = loaded.get(name) {
				registry.register(definition.as_ref().clone());
			}
		}

		Ok(output)
	}

	pub fn render_str(
		&self,
		source: &str,
		registry: &mut Registry,
		context: &Context,
	) -> PaletteResult<String> {
		self.render(&parse(source)?, registry, context)
	}

	/// Render a single component invocation against an existing registry
	/// without modifying it.
	pub fn invoke(
		&self,
		registry: &Registry,
		invocation: &Invocation,
		context: &Context,
	) -> PaletteResult<String> {
		let overrides = invocation
			.overrides
			.iter()
			.map(|(name, source)| Ok((name.clone(), lower(&parse(source)?.nodes))))
			.collect::<PaletteResult<Vec<_>>>()?;

		let mut layer: BTreeMap<String, Value> = invocation.context.iter().cloned().collect();
		layer.insert(
			"component_name".to_string(),
			Value::from(invocation.component.as_str()),
		);

		let session = Session::new(self, registry.clone());
		session.render_component(&self.env, ComponentRequest {
			name: invocation.component.clone(),
			file: None,
			layer,
			overrides,
			captured: BTreeMap::new(),
			ctx: context.clone(),
			caller: None,
		})
	}
}

#[cfg(test)]
impl Engine {
	/// Number of lowered templates known to the environment.
	pub(crate) fn cached_templates(&self) -> usize {
		self.sources
			.sources
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}
}

/// Lowered template sources by cache key, read by the environment loader.
#[derive(Default)]
struct SourceMap {
	sources: RwLock<HashMap<String, String>>,
}

impl SourceMap {
	fn insert(&self, unit: &Unit) {
		if self
			.sources
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.contains_key(&unit.key)
		{
			return;
		}

		self.sources
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.entry(unit.key.clone())
			.or_insert_with(|| unit.source.clone());
	}

	fn get(&self, key: &str) -> Option<String> {
		self.sources
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(key)
			.cloned()
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The overrides supplied by one invocation, linked to the slots of the
/// template the invocation appears in.
struct Slots {
	component: String,
	overrides: Vec<(String, Arc<Unit>)>,
	/// Loop and `set` variables of the invoking template that the override
	/// bodies read.
	captured: BTreeMap<String, Value>,
	caller: Option<Arc<Slots>>,
	/// Length of the active component stack where the invocation appears.
	stack_len: usize,
}

impl Slots {
	fn find(&self, block: &str) -> Option<&Arc<Unit>> {
		self.overrides
			.iter()
			.rev()
			.find(|(name, _)| name == block)
			.map(|(_, unit)| unit)
	}
}

struct ComponentRequest {
	name: String,
	file: Option<String>,
	/// Keyword context plus `component_name`.
	layer: BTreeMap<String, Value>,
	overrides: Vec<(String, Arc<Unit>)>,
	captured: BTreeMap<String, Value>,
	ctx: Context,
	caller: Option<Arc<Slots>>,
}

#[derive(Default)]
struct ActiveStack {
	/// Names of the components whose definitions are being rendered.
	names: Vec<String>,
	depth: usize,
}

/// State shared by every template rendered during one `render` or `invoke`
/// call.
struct Session {
	options: RenderOptions,
	loader: Option<Arc<dyn TemplateLoader>>,
	sources: Arc<SourceMap>,
	registry: Registry,
	/// Components loaded through `file=` during this render.
	loaded: Mutex<Registry>,
	stack: Mutex<ActiveStack>,
	/// The first failure raised inside a palette function. minijinja only
	/// carries a message across the template boundary.
	error: Mutex<Option<PaletteError>>,
}

impl Session {
	fn new(engine: &Engine, registry: Registry) -> Arc<Self> {
		Arc::new(Self {
			options: engine.options,
			loader: engine.loader.clone(),
			sources: Arc::clone(&engine.sources),
			registry,
			loaded: Mutex::new(Registry::new()),
			stack: Mutex::new(ActiveStack::default()),
			error: Mutex::new(None),
		})
	}

	fn take_loaded(&self) -> Registry {
		std::mem::take(&mut *lock(&self.loaded))
	}

	fn fail(&self, error: PaletteError) -> Error {
		let message = error.to_string();
		lock(&self.error).get_or_insert(error);
		Error::new(ErrorKind::InvalidOperation, message)
	}

	fn render_unit(
		self: &Arc<Self>,
		env: &Environment<'_>,
		unit: &Arc<Unit>,
		ctx: Context,
		slots: Option<Arc<Slots>>,
	) -> PaletteResult<String> {
		if unit.is_static() {
			return Ok(unit.source.clone());
		}

		self.sources.insert(unit);
		let template = env.get_template(&unit.key)?;

		let mut values = ctx.flatten_map();
		let frame = Frame {
			session: Arc::clone(self),
			unit: Arc::clone(unit),
			slots,
			ctx,
		};
		values.insert(FRAME_KEY.to_string(), Value::from_object(frame));

		template
			.render(Value::from(values))
			.map_err(|error| lock(&self.error).take().unwrap_or_else(|| error.into()))
	}

	/// Top-level names read by `unit`.
	fn variables(&self, env: &Environment<'_>, unit: &Unit) -> PaletteResult<HashSet<String>> {
		if unit.is_static() {
			return Ok(HashSet::new());
		}

		self.sources.insert(unit);
		Ok(env.get_template(&unit.key)?.undeclared_variables(false))
	}

	fn render_component(
		self: &Arc<Self>,
		env: &Environment<'_>,
		request: ComponentRequest,
	) -> PaletteResult<String> {
		let ComponentRequest {
			name,
			file,
			layer,
			overrides,
			captured,
			mut ctx,
			caller,
		} = request;

		self.check_nesting(&name)?;
		let definition = self.lookup(&name, file.as_deref())?;

		for (block, _) in &overrides {
			if definition.has_block(block) {
				continue;
			}

			if self.options.strict_overrides {
				return Err(PaletteError::UnknownOverride {
					component: name,
					block: block.clone(),
				});
			}

			tracing::warn!(
				component = %name,
				block = %block,
				"override does not match any block and is ignored",
			);
		}

		let stack_len = {
			let mut stack = lock(&self.stack);
			let len = stack.names.len();
			stack.names.push(name);
			stack.depth += 1;
			len
		};

		let slots = Arc::new(Slots {
			component: definition.name.clone(),
			overrides,
			captured,
			caller,
			stack_len,
		});

		ctx.push(layer);
		let result = self.render_unit(env, &definition.unit, ctx, Some(slots));

		let mut stack = lock(&self.stack);
		stack.names.pop();
		stack.depth -= 1;

		result
	}

	fn check_nesting(&self, name: &str) -> PaletteResult<()> {
		let stack = lock(&self.stack);

		if stack.depth >= self.options.max_depth {
			return Err(PaletteError::RecursionLimit {
				limit: self.options.max_depth,
			});
		}

		if stack.names.iter().any(|active| active == name) {
			let mut chain = stack.names.clone();
			chain.push(name.to_string());
			return Err(PaletteError::CyclicComponent {
				chain: chain.join(" -> "),
			});
		}

		Ok(())
	}

	/// Override bodies belong to the invoking template, so the components
	/// entered since the invocation are set aside while one renders.
	fn render_override(
		self: &Arc<Self>,
		env: &Environment<'_>,
		slots: &Slots,
		unit: &Arc<Unit>,
		ctx: Context,
	) -> PaletteResult<String> {
		let inner = {
			let mut stack = lock(&self.stack);
			let at = slots.stack_len.min(stack.names.len());
			stack.names.split_off(at)
		};

		let result = self.render_unit(env, unit, ctx, slots.caller.clone());
		lock(&self.stack).names.extend(inner);

		result
	}

	fn lookup(&self, name: &str, file: Option<&str>) -> PaletteResult<Arc<ComponentDefinition>> {
		if let Some(definition) = lock(&self.loaded).get(name).or_else(|| self.registry.get(name)) {
			return Ok(definition);
		}

		let Some(file) = file else {
			return Err(PaletteError::ComponentNotDeclared {
				name: name.to_string(),
			});
		};

		let Some(loader) = &self.loader else {
			return Err(PaletteError::TemplateNotFound {
				name: file.to_string(),
			});
		};

		tracing::debug!(component = name, file, "loading component template");
		let template = parse_named(file, loader.load(file)?)?;
		let mut loaded = lock(&self.loaded);
		for declaration in template.components() {
			loaded.register(ComponentDefinition::from_declaration(declaration, Some(file)));
		}

		loaded.lookup(name)
	}
}

/// The unit being rendered, reachable from the palette functions through the
/// template context.
struct Frame {
	session: Arc<Session>,
	unit: Arc<Unit>,
	slots: Option<Arc<Slots>>,
	ctx: Context,
}

impl fmt::Debug for Frame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Frame")
			.field("unit", &self.unit.key)
			.finish_non_exhaustive()
	}
}

impl Object for Frame {}

impl Frame {
	fn render_call(
		&self,
		state: &State<'_, '_>,
		index: usize,
		component: &Value,
		file: &Value,
		context: &Value,
	) -> PaletteResult<String> {
		let Some(Call::Render(call)) = self.unit.calls.get(index) else {
			return Err(missing_call(index));
		};

		let name = match component.as_str() {
			Some(name) => name.to_string(),
			None if component.is_undefined() || component.is_none() => {
				return Err(PaletteError::ComponentNotDeclared {
					name: call.component.to_string(),
				});
			}
			None => component.to_string(),
		};

		let file = if file.is_undefined() || file.is_none() {
			None
		} else {
			Some(file.to_string())
		};

		let mut layer = BTreeMap::new();
		for key in context.try_iter()? {
			let value = context.get_item(&key)?;
			layer.insert(key.to_string(), value);
		}
		layer.insert("component_name".to_string(), Value::from(name.as_str()));

		let captured = self.capture(state, call.overrides.iter().map(|(_, unit)| unit))?;

		self.session.render_component(state.env(), ComponentRequest {
			name,
			file,
			layer,
			overrides: call.overrides.clone(),
			captured,
			ctx: self.ctx.clone(),
			caller: self.slots.clone(),
		})
	}

	/// Loop and `set` variables of the live template state that `units` read.
	/// They are not part of the frame's context.
	fn capture<'u>(
		&self,
		state: &State<'_, '_>,
		units: impl IntoIterator<Item = &'u Arc<Unit>>,
	) -> PaletteResult<BTreeMap<String, Value>> {
		let mut captured = BTreeMap::new();

		for unit in units {
			for variable in self.session.variables(state.env(), unit)? {
				if variable.starts_with(RESERVED_PREFIX) || captured.contains_key(&variable) {
					continue;
				}
				let Some(value) = state.lookup(&variable) else {
					continue;
				};
				if value.is_undefined() || self.ctx.get(&variable) == Some(&value) {
					continue;
				}
				captured.insert(variable, value);
			}
		}

		Ok(captured)
	}

	fn render_block(&self, state: &State<'_, '_>, index: usize, default: Value) -> PaletteResult<Value> {
		let Some(Call::Block(block)) = self.unit.calls.get(index) else {
			return Err(missing_call(index));
		};

		let Some((slots, unit)) = self
			.slots
			.as_ref()
			.and_then(|slots| slots.find(block).map(|unit| (slots, unit)))
		else {
			tracing::trace!(block = %block, "rendering default block content");
			return Ok(default);
		};

		tracing::trace!(component = %slots.component, block = %block, "rendering override");

		// Loop variables of the component are visible to the override, and
		// those of the invoking template take precedence.
		let locals = self.capture(state, [unit])?;
		let mut ctx = self.ctx.clone();
		for layer in [locals, slots.captured.clone()] {
			if !layer.is_empty() {
				ctx.push(layer);
			}
		}
		ctx.push(BTreeMap::from([(
			"block".to_string(),
			Value::from(BTreeMap::from([(
				"super".to_string(),
				Value::from_safe_string(default.to_string()),
			)])),
		)]));

		let output = self.session.render_override(state.env(), slots, unit, ctx)?;
		Ok(Value::from_safe_string(output))
	}
}

fn missing_call(index: usize) -> PaletteError {
	PaletteError::TemplateRender(format!("no palette tag at index {index}"))
}

/// Run `f` with the frame of the unit being rendered.
fn with_frame<T>(
	state: &State<'_, '_>,
	f: impl FnOnce(&Frame) -> PaletteResult<T>,
) -> Result<T, Error> {
	let outside = || {
		Error::new(
			ErrorKind::InvalidOperation,
			"palette functions can only be called from palette templates",
		)
	};
	let value = state.lookup(FRAME_KEY).ok_or_else(outside)?;
	let frame = value.downcast_object_ref::<Frame>().ok_or_else(outside)?;

	f(frame).map_err(|error| frame.session.fail(error))
}

fn ui_function(
	state: &State<'_, '_>,
	index: usize,
	component: Value,
	file: Value,
	context: Value,
) -> Result<Value, Error> {
	with_frame(state, |frame| {
		frame
			.render_call(state, index, &component, &file, &context)
			.map(Value::from_safe_string)
	})
}

fn block_function(state: &State<'_, '_>, index: usize, default: Value) -> Result<Value, Error> {
	with_frame(state, |frame| frame.render_block(state, index, default))
}
