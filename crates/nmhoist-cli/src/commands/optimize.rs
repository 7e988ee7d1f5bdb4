//! `nmhoist optimize`: load, optimize, plan and optionally apply.

use super::scan::ScanSummary;
use super::tree::{render_hooks, render_modules};
use super::{heading, print_json, runtime, w, Project};
use miette::{IntoDiagnostic, Result};
use nmhoist_core::apply::ApplyAction;
use nmhoist_core::report::{describe_tree, find_script_hooks, ModuleListing, ScriptHooks};
use nmhoist_core::version::SCHEMA_VERSION;
use nmhoist_core::{
    apply_plan, build_plan, ApplyOptions, ApplyOutcome, Config, DiskMeasure, IgnoreSet,
    OptimizeOptions, OptimizeReport, PackageManager, Plan, TreeOptimizer,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct OptimizeArgs {
    pub listing: Option<PathBuf>,
    pub apply: bool,
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub max_iterations: Option<usize>,
    pub ignore: Vec<String>,
    pub assume_root: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub dedupe: bool,
}

#[derive(Serialize)]
struct OptimizeOutput {
    schema_version: u32,
    ok: bool,
    root: PathBuf,
    hooks: Vec<ScriptHooks>,
    original_tree: Vec<ModuleListing>,
    optimized_tree: Vec<ModuleListing>,
    report: OptimizeReport,
    plan: Plan,
    apply: Option<ApplyOutcome>,
    scan_before: ScanSummary,
    scan_after: Option<ScanSummary>,
}

pub fn run(config: &Config, args: OptimizeArgs) -> Result<()> {
    let project = Project::discover(config)?;
    let mut settings = project.settings.clone().with_extra_ignore(args.ignore);
    if let Some(limit) = args.limit {
        settings = settings.with_path_limit(limit);
    }
    if let Some(max) = args.max_iterations {
        settings = settings.with_max_iterations(max);
    }
    if args.assume_root.is_some() {
        settings.assumed_root = args.assume_root;
    }

    let ignore = IgnoreSet::new(&settings.ignore).into_diagnostic()?;
    let rt = runtime()?;

    if args.dedupe {
        if args.listing.is_some() {
            warn!("--dedupe has no effect with --listing, skipping");
        } else {
            let manager = PackageManager::new(settings.package_manager.as_str());
            info!(program = manager.program(), "deduplicating before listing");
            rt.block_on(manager.dedupe(&project.root)).into_diagnostic()?;
        }
    }

    let mut tree = project.load_tree(config, args.listing.as_deref(), &rt)?;
    let root_path = tree.get(tree.root()).real_path().to_path_buf();
    let hooks = find_script_hooks(&tree);

    tree.calculate_weights(&root_path, &ignore, &DiskMeasure)
        .into_diagnostic()?;
    let original_tree = describe_tree(&tree);
    let scan_before = ScanSummary::collect(&project.root, settings.assumed_root.as_deref(), settings.path_limit)?;

    let optimizer = TreeOptimizer::new(OptimizeOptions {
        max_iterations: settings.max_iterations,
    });
    let report = optimizer
        .optimize(&mut tree, &root_path, &ignore, &DiskMeasure)
        .into_diagnostic()?;
    info!(
        original = report.original_max_weight,
        optimized = report.new_max_weight,
        iterations = report.iterations,
        "tree optimized"
    );

    let optimized_tree = describe_tree(&tree);
    let plan = build_plan(&tree);

    let apply = if args.apply || args.dry_run {
        let manager = PackageManager::new(settings.package_manager.as_str());
        let options = ApplyOptions {
            dry_run: args.dry_run,
        };
        Some(rt.block_on(apply_plan(&plan, &manager, options)))
    } else {
        None
    };

    let scan_after = match &apply {
        Some(outcome) if !outcome.dry_run => Some(ScanSummary::collect(
            &project.root,
            settings.assumed_root.as_deref(),
            settings.path_limit,
        )?),
        _ => None,
    };

    let output = OptimizeOutput {
        schema_version: SCHEMA_VERSION,
        ok: !matches!(&apply, Some(outcome) if !outcome.ok()),
        root: project.root.clone(),
        hooks,
        original_tree,
        optimized_tree,
        report,
        plan,
        apply,
        scan_before,
        scan_after,
    };

    if let Some(path) = &args.report {
        write_report(&config.cwd.join(path), &output)?;
    }

    if config.json_logs {
        print_json(&output)?;
    } else {
        print_human(&output)?;
    }

    match &output.apply {
        Some(outcome) if !outcome.ok() => Err(miette::miette!(
            "{} module(s) could not be moved, removed or reinstalled",
            outcome.failures.len()
        )),
        _ => Ok(()),
    }
}

fn write_report(path: &Path, output: &OptimizeOutput) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(output).into_diagnostic()?;
    nmhoist_util::fs::atomic_write(path, &bytes)
        .map_err(|e| miette::miette!("Failed to write report {}: {}", path.display(), e))
}

fn print_human(output: &OptimizeOutput) -> Result<()> {
    let mut out = io::stdout().lock();

    render_hooks(&mut out, &output.hooks)?;
    if !output.hooks.is_empty() {
        w(&mut out, "  \x1b[33mThese scripts will not run again for relocated modules\x1b[0m\n\n")?;
    }

    heading(&mut out, "Original tree")?;
    render_modules(&mut out, &output.original_tree)?;
    w(&mut out, "\n")?;

    heading(&mut out, "Decisions")?;
    for decision in &output.report.decisions {
        let target = decision
            .target
            .as_deref()
            .map(|t| format!(" -> {t}"))
            .unwrap_or_default();
        w(
            &mut out,
            &format!(
                "  {:<8} {}{target} ({})\n",
                format!("{:?}", decision.action).to_lowercase(),
                decision.module,
                decision.reason
            ),
        )?;
    }
    let report = &output.report;
    w(
        &mut out,
        &format!(
            "  Longest path weight {} -> {} after {} step(s){}\n\n",
            report.original_max_weight,
            report.new_max_weight,
            report.iterations,
            if report.converged { "" } else { " (stopped early)" }
        ),
    )?;

    heading(&mut out, "Optimized tree")?;
    render_modules(&mut out, &output.optimized_tree)?;
    w(&mut out, "\n")?;

    heading(&mut out, "Plan")?;
    if output.plan.is_empty() {
        w(&mut out, "  Nothing to do\n")?;
    }
    for planned in &output.plan.moves {
        w(
            &mut out,
            &format!(
                "  move   {}@{}  {} -> {}\n",
                planned.module,
                planned.version,
                planned.from.display(),
                planned.to.display()
            ),
        )?;
    }
    for removal in &output.plan.removals {
        w(
            &mut out,
            &format!(
                "  remove {}@{}  {}\n",
                removal.module,
                removal.version,
                removal.path.display()
            ),
        )?;
    }
    w(&mut out, "\n")?;

    if let Some(outcome) = &output.apply {
        heading(
            &mut out,
            if outcome.dry_run { "Dry run" } else { "Applied" },
        )?;
        for action in &outcome.actions {
            w(&mut out, &format!("  {}\n", describe_action(action)))?;
        }
        for failure in &outcome.failures {
            w(
                &mut out,
                &format!(
                    "  \x1b[31mfailed\x1b[0m {} at {}: {}\n",
                    failure.module,
                    failure.path.display(),
                    failure.error
                ),
            )?;
        }
        w(&mut out, "\n")?;
    }

    heading(&mut out, "Long paths before")?;
    output.scan_before.render(&mut out)?;
    if let Some(after) = &output.scan_after {
        w(&mut out, "\n")?;
        heading(&mut out, "Long paths after")?;
        after.render(&mut out)?;
    }

    out.flush().into_diagnostic()
}

fn describe_action(action: &ApplyAction) -> String {
    match action {
        ApplyAction::Moved { module, from, to } => {
            format!("moved {module} {} -> {}", from.display(), to.display())
        }
        ApplyAction::SourceMissing { module, from } => {
            format!("missing {module} at {}, reinstalling", from.display())
        }
        ApplyAction::Removed { module, path } => format!("removed {module} {}", path.display()),
        ApplyAction::RemovalMissing { module, path } => {
            format!("already gone {module} {}", path.display())
        }
        ApplyAction::Reinstalled { module, dir } => {
            format!("reinstalled {module} into {}", dir.display())
        }
    }
}
