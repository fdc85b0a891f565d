//! Pipeline entry points.
//!
//! - `run_pipeline`: discover, reconcile, notify and persist once
//! - `preview`: discover, classify and reconcile without side effects

pub mod batch;
pub mod guard;
pub mod run;

pub use batch::build_batch;
pub use guard::DuplicateGuard;
pub use run::{Pipeline, Preview, RunOutcome, discover, dry_run, preview, run_pipeline};
