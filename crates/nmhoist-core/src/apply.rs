//! Executing a [`Plan`] on disk.
//!
//! Moves run first, then removals. A move whose source is gone is turned into a
//! reinstall of `name@version` into the destination's parent directory.
//! Reinstalls run one depth at a time, shallowest first; within a depth,
//! different directories are installed into concurrently while installs that
//! share a directory run one after another.

use crate::error::Result;
use crate::plan::{Plan, PlannedMove};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Installs a single package into a directory.
pub trait Installer {
    /// Install `spec` (`name@version`) so that it lands in `dir/node_modules`.
    fn install(&self, dir: &Path, spec: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Record what would happen without touching the disk.
    pub dry_run: bool,
}

/// Something the executor did (or, in a dry run, would do).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyAction {
    Moved {
        module: String,
        from: PathBuf,
        to: PathBuf,
    },
    /// The move source did not exist; a reinstall was queued.
    SourceMissing { module: String, from: PathBuf },
    Removed { module: String, path: PathBuf },
    /// Nothing to delete.
    RemovalMissing { module: String, path: PathBuf },
    Reinstalled { module: String, dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub module: String,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub dry_run: bool,
    pub actions: Vec<ApplyAction>,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyOutcome {
    /// True when every move, removal and reinstall succeeded.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, module: &str, path: &Path, error: impl ToString) {
        self.failures.push(ApplyFailure {
            module: module.to_string(),
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}

/// Execute `plan`.
///
/// Failures never abort the run; they are collected in
/// [`ApplyOutcome::failures`].
pub async fn apply_plan<I: Installer>(plan: &Plan, installer: &I, options: ApplyOptions) -> ApplyOutcome {
    let mut outcome = ApplyOutcome {
        dry_run: options.dry_run,
        ..ApplyOutcome::default()
    };

    let mut reinstalls: Vec<&PlannedMove> = Vec::new();
    for planned in &plan.moves {
        if options.dry_run {
            outcome.actions.push(ApplyAction::Moved {
                module: planned.module.clone(),
                from: planned.from.clone(),
                to: planned.to.clone(),
            });
            continue;
        }
        if !is_dir(&planned.from).await {
            warn!(module = %planned.module, from = %planned.from.display(), "move source missing, will reinstall");
            outcome.actions.push(ApplyAction::SourceMissing {
                module: planned.module.clone(),
                from: planned.from.clone(),
            });
            reinstalls.push(planned);
            continue;
        }
        match move_dir(&planned.from, &planned.to).await {
            Ok(()) => {
                info!(module = %planned.module, to = %planned.to.display(), "moved module");
                outcome.actions.push(ApplyAction::Moved {
                    module: planned.module.clone(),
                    from: planned.from.clone(),
                    to: planned.to.clone(),
                });
            }
            Err(e) => {
                warn!(module = %planned.module, error = %e, "failed to move module");
                outcome.fail(&planned.module, &planned.from, e);
            }
        }
    }

    for removal in &plan.removals {
        if options.dry_run {
            outcome.actions.push(ApplyAction::Removed {
                module: removal.module.clone(),
                path: removal.path.clone(),
            });
            continue;
        }
        if !is_dir(&removal.path).await {
            debug!(path = %removal.path.display(), "nothing to remove");
            outcome.actions.push(ApplyAction::RemovalMissing {
                module: removal.module.clone(),
                path: removal.path.clone(),
            });
            continue;
        }
        match tokio::fs::remove_dir_all(&removal.path).await {
            Ok(()) => {
                info!(module = %removal.module, path = %removal.path.display(), "removed module");
                outcome.actions.push(ApplyAction::Removed {
                    module: removal.module.clone(),
                    path: removal.path.clone(),
                });
            }
            Err(e) => {
                warn!(module = %removal.module, error = %e, "failed to remove module");
                outcome.fail(&removal.module, &removal.path, e);
            }
        }
    }

    reinstall(&reinstalls, installer, &mut outcome).await;
    outcome
}

async fn reinstall<I: Installer>(modules: &[&PlannedMove], installer: &I, outcome: &mut ApplyOutcome) {
    let mut levels: BTreeMap<usize, BTreeMap<&Path, Vec<&PlannedMove>>> = BTreeMap::new();
    for &planned in modules {
        levels
            .entry(planned.depth)
            .or_default()
            .entry(planned.install_dir.as_path())
            .or_default()
            .push(planned);
    }

    for (depth, dirs) in levels {
        debug!(depth, dirs = dirs.len(), "reinstalling level");
        let batches = dirs.into_iter().map(|(dir, batch)| async move {
            let mut results = Vec::with_capacity(batch.len());
            for planned in batch {
                let spec = format!("{}@{}", planned.module, planned.version);
                info!(%spec, dir = %dir.display(), "reinstalling module");
                results.push((planned, installer.install(dir, &spec).await));
            }
            results
        });

        for (planned, result) in join_all(batches).await.into_iter().flatten() {
            match result {
                Ok(()) => outcome.actions.push(ApplyAction::Reinstalled {
                    module: planned.module.clone(),
                    dir: planned.install_dir.clone(),
                }),
                Err(e) => {
                    warn!(module = %planned.module, error = %e, "reinstall failed");
                    outcome.fail(&planned.module, &planned.install_dir, e);
                }
            }
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_dir())
}

async fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(from, to).await
}
