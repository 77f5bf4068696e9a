use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render and check templates built from reusable components.",
	long_about = "palette composes HTML templates from components with named blocks. Pages \
	              invoke a component and override only the blocks they need; everything else \
	              renders the component's defaults.\n\nQuick start:\n  palette init      \
	              Create palette.toml and a sample component\n  palette render    Render a \
	              template\n  palette check     Report undeclared components and unknown \
	              overrides\n  palette list      List declared components and their blocks"
)]
pub struct PaletteCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize palette in a project.
	///
	/// Creates `palette.toml` and `templates/components.html` with a sample
	/// card component. Existing files are left untouched.
	Init,
	/// Render a template and print the result.
	///
	/// The template is looked up in the configured template directories
	/// first and then treated as a path. Every component declared in the
	/// project is available, and data files from `palette.toml` are exposed
	/// under their namespace.
	Render {
		/// Template name or path.
		template: String,

		/// JSON, TOML or YAML files whose top-level keys are added to the
		/// render context. Later files win.
		#[arg(long = "data", short)]
		data: Vec<PathBuf>,

		/// Fail when an override names a block the component does not have.
		#[arg(long, default_value_t = false)]
		strict_overrides: bool,
	},
	/// Check templates for problems without rendering them.
	///
	/// Reports parse errors, invocations of undeclared components, overrides
	/// of unknown blocks, repeated overrides and conflicting declarations.
	/// Checks every template in the project when no files are given. Exits
	/// with a non-zero status code when anything is reported.
	Check {
		/// Template files to check.
		templates: Vec<PathBuf>,

		/// Output format for check results. Use `text` for human-readable
		/// output or `json` for programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the components declared in the project and their blocks.
	List {
		/// Only list components declared in these files.
		templates: Vec<PathBuf>,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
