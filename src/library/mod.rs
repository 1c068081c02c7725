//! Report library maintenance.
//!
//! Housekeeping over the workspace tree that sits outside a single run:
//! scratch notes and already-written reports.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/
//! ├── scratch/
//! │   └── <YYYY-MM-DD>.md           # raw notes, removed once reported
//! └── content/daily/<YYYY>/<M>/
//!     ├── .report_hashes.json       # fingerprints of reported inputs
//!     └── <YYYY-MM-DD>-<slug>.md    # reports, input_hash in frontmatter
//! ```

pub mod reports;
pub mod scratch;

pub use reports::{delete_report, DeletedReport};
pub use scratch::{cleanup, collect_report_fingerprints, ensure_note, today_note_path};
