use super::{heading, print_json, w, Project};
use miette::{IntoDiagnostic, Result};
use nmhoist_core::version::SCHEMA_VERSION;
use nmhoist_core::Config;
use nmhoist_util::scan_long_paths;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Serializable form of a long-path scan.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub base: PathBuf,
    pub assume_root: Option<PathBuf>,
    pub limit: usize,
    pub length_offset: isize,
    pub longest_length: usize,
    pub longest_paths: Vec<String>,
    pub long_paths: Vec<String>,
}

impl ScanSummary {
    pub fn collect(base: &Path, assume_root: Option<&Path>, limit: usize) -> Result<Self> {
        let scan = scan_long_paths(base, assume_root, limit)
            .map_err(|e| miette::miette!("Failed to scan {}: {}", base.display(), e))?;
        Ok(Self {
            base: base.to_path_buf(),
            assume_root: assume_root.map(Path::to_path_buf),
            limit,
            length_offset: scan.length_offset,
            longest_length: scan.longest_length,
            longest_paths: scan.longest_paths,
            long_paths: scan.long_paths,
        })
    }

    pub fn render(&self, out: &mut impl Write) -> Result<()> {
        w(out, &format!("  Base:           {}\n", self.base.display()))?;
        if let Some(root) = &self.assume_root {
            w(out, &format!("  Assumed root:   {}\n", root.display()))?;
        }
        w(out, &format!("  Limit:          {}\n", self.limit))?;
        w(out, &format!("  Longest:        {}\n", self.longest_length))?;
        for path in &self.longest_paths {
            w(out, &format!("    {path}\n"))?;
        }
        if self.long_paths.is_empty() {
            w(out, "  No paths over the limit\n")?;
        } else {
            w(out, &format!("  Over the limit: {}\n", self.long_paths.len()))?;
            for path in &self.long_paths {
                w(out, &format!("    \x1b[33m{path}\x1b[0m\n"))?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    schema_version: u32,
    ok: bool,
    scan: &'a ScanSummary,
}

/// Run the scan command. Fails when any path is over the limit.
pub fn run(config: &Config, path: Option<&Path>, assume_root: Option<&Path>, limit: Option<usize>) -> Result<()> {
    let project = Project::discover(config)?;
    let base = path.map_or_else(|| config.cwd.clone(), |p| config.cwd.join(p));
    let base = dunce::canonicalize(&base).into_diagnostic()?;
    let assume_root = assume_root.or(project.settings.assumed_root.as_deref());
    let limit = limit.unwrap_or(project.settings.path_limit);

    let summary = ScanSummary::collect(&base, assume_root, limit)?;
    let ok = summary.long_paths.is_empty();

    if config.json_logs {
        print_json(&ScanOutput {
            schema_version: SCHEMA_VERSION,
            ok,
            scan: &summary,
        })?;
    } else {
        let mut out = io::stdout().lock();
        heading(&mut out, "Long paths")?;
        summary.render(&mut out)?;
    }

    if ok {
        Ok(())
    } else {
        Err(miette::miette!(
            "{} path(s) exceed {} characters",
            summary.long_paths.len(),
            limit
        ))
    }
}
