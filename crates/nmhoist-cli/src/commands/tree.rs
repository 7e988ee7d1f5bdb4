use super::{heading, print_json, runtime, w, Project};
use miette::{IntoDiagnostic, Result};
use nmhoist_core::report::{describe_tree, find_script_hooks, ModuleListing, RangeStatus, ScriptHooks};
use nmhoist_core::version::SCHEMA_VERSION;
use nmhoist_core::{Config, DiskMeasure, IgnoreSet};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Serialize)]
struct TreeOutput {
    schema_version: u32,
    modules: Vec<ModuleListing>,
    hooks: Vec<ScriptHooks>,
}

pub fn run(config: &Config, listing: Option<&Path>) -> Result<()> {
    let project = Project::discover(config)?;
    let ignore = IgnoreSet::new(&project.settings.ignore).into_diagnostic()?;
    let rt = runtime()?;

    let mut tree = project.load_tree(config, listing, &rt)?;
    let root_path = tree.get(tree.root()).real_path().to_path_buf();
    tree.calculate_weights(&root_path, &ignore, &DiskMeasure)
        .into_diagnostic()?;
    tree.sort_children();

    let output = TreeOutput {
        schema_version: SCHEMA_VERSION,
        modules: describe_tree(&tree),
        hooks: find_script_hooks(&tree),
    };

    if config.json_logs {
        print_json(&output)
    } else {
        let mut out = io::stdout().lock();
        heading(&mut out, "Modules")?;
        render_modules(&mut out, &output.modules)?;
        render_hooks(&mut out, &output.hooks)
    }
}

pub fn render_modules(out: &mut impl Write, modules: &[ModuleListing]) -> Result<()> {
    for module in modules {
        let indent = "  ".repeat(module.depth);
        w(out, &format!("{}{indent}{}\n", module.marker, module.label))?;
        for dependency in &module.dependencies {
            let note = match dependency.status {
                RangeStatus::Satisfied => String::new(),
                RangeStatus::Unsatisfied => " \x1b[33m(range not satisfied)\x1b[0m".to_string(),
                RangeStatus::Unchecked => " (range not checked)".to_string(),
                RangeStatus::Missing => " \x1b[31m(missing)\x1b[0m".to_string(),
            };
            let resolved = dependency.resolved.as_deref().unwrap_or("-");
            w(
                out,
                &format!(
                    " {indent}    -> {}@{} = {resolved}{note}\n",
                    dependency.name, dependency.range
                ),
            )?;
        }
        for dependant in &module.dependants {
            w(out, &format!(" {indent}    <- {dependant}\n"))?;
        }
    }
    Ok(())
}

pub fn render_hooks(out: &mut impl Write, hooks: &[ScriptHooks]) -> Result<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    w(out, "\n")?;
    heading(out, "Lifecycle scripts")?;
    for module in hooks {
        w(out, &format!("  {}\n", module.module))?;
        for (hook, command) in &module.hooks {
            w(out, &format!("    {hook}: {command}\n"))?;
        }
    }
    Ok(())
}
