use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

#[allow(dead_code)]
pub const CARD_COMPONENT: &str = concat!(
	r#"{% palette_component "card" %}"#,
	r"{% palette_block header %}<h5>{{ title }}</h5>{% endpalette_block %}",
	r"{% palette_block body %}<p>{{ content }}</p>{% endpalette_block %}",
	r"{% endpalette_component %}",
);

pub fn palette_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("palette"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

/// Write a project with a `templates` directory holding the card component
/// and the given pages.
#[allow(dead_code)]
pub fn write_project(root: &Path, pages: &[(&str, &str)]) -> std::io::Result<()> {
	let templates = root.join("templates");
	std::fs::create_dir_all(&templates)?;
	std::fs::write(root.join("palette.toml"), "[templates]\npaths = [\"templates\"]\n")?;
	std::fs::write(templates.join("components.html"), CARD_COMPONENT)?;

	for (name, content) in pages {
		let path = templates.join(name);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, content)?;
	}

	Ok(())
}
