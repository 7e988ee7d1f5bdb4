pub mod optimize;
pub mod scan;
pub mod tree;
pub mod version;

use miette::{IntoDiagnostic, Result};
use nmhoist_core::paths::project_root;
use nmhoist_core::{load_listing, parse_listing, Config, ModuleTree, PackageManager, Settings};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

/// Name given to the root module in labels.
const ROOT_NAME: &str = ".";

/// The project the command works on and its settings file.
pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
}

impl Project {
    /// Walk up from the working directory to the project root and read `nmhoist.json`.
    pub fn discover(config: &Config) -> Result<Self> {
        let root = project_root(&config.cwd).unwrap_or_else(|| config.cwd.clone());
        let root = dunce::canonicalize(&root).unwrap_or(root);
        let settings = Settings::load(&root).into_diagnostic()?;
        tracing::debug!(root = %root.display(), "project discovered");
        Ok(Self { root, settings })
    }

    /// Load the installed tree, from `listing` when given, otherwise from the
    /// package manager.
    pub fn load_tree(&self, config: &Config, listing: Option<&Path>, rt: &Runtime) -> Result<ModuleTree> {
        let value = match listing {
            Some(file) => {
                let file = config.cwd.join(file);
                let text = nmhoist_util::fs::read_to_string_lossy(&file)
                    .map_err(|e| miette::miette!("Failed to read listing {}: {}", file.display(), e))?;
                parse_listing(&text).into_diagnostic()?
            }
            None => {
                let manager = PackageManager::new(self.settings.package_manager.as_str());
                rt.block_on(manager.list(&self.root)).into_diagnostic()?
            }
        };
        load_listing(&value, ROOT_NAME, &self.root).into_diagnostic()
    }
}

pub fn runtime() -> Result<Runtime> {
    Runtime::new().into_diagnostic()
}

pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn w(out: &mut impl Write, s: &str) -> Result<()> {
    out.write_all(s.as_bytes()).into_diagnostic()
}

fn heading(out: &mut impl Write, title: &str) -> Result<()> {
    w(out, &format!("\x1b[1m## {title}\x1b[0m\n"))
}
