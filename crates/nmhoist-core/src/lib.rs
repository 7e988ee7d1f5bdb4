#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! nmhoist core: module tree model, hoisting optimizer and install plans.
//!
//! The usual flow is [`listing::load_listing`] → [`TreeOptimizer::optimize`] →
//! [`plan::build_plan`] → [`apply::apply_plan`].

pub mod apply;
pub mod config;
pub mod error;
pub mod listing;
pub mod npm;
pub mod optimize;
pub mod paths;
pub mod pattern;
pub mod plan;
pub mod report;
pub mod tree;
pub mod version;
pub mod weight;

pub use apply::{apply_plan, ApplyOptions, ApplyOutcome, Installer};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use listing::{load_listing, parse_listing};
pub use npm::PackageManager;
pub use optimize::{Decision, DecisionAction, OptimizeOptions, OptimizeReport, TreeOptimizer};
pub use pattern::{IgnorePattern, IgnoreSet};
pub use plan::{build_plan, Plan};
pub use tree::{ModuleNode, ModuleTree, NodeId, VersionDependency};
pub use version::VERSION;
pub use weight::{DiskMeasure, PathMeasure, StaticMeasure};
