//! Markdown formatting for plans, run reports and change history.
//!
//! Domain models get direct `Display` implementations in [`models`];
//! collections and operation results get newtype wrappers so the same data
//! can be formatted differently depending on context. Every formatter
//! produces Markdown, which the CLI renders with termimad and which reads
//! fine as plain text.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │  Display impls  │    │    Markdown     │
//! │ (RunReport,     │───▶│  & wrappers     │───▶│    output       │
//! │  ChangeSet)     │    │                 │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! - [`collections`]: [`ChangeSetSummaries`] for history listings
//! - [`results`]: [`RevertResult`], [`ValidationResult`] and
//!   [`AnalysisResults`]
//! - [`status`]: [`OperationStatus`] one-line confirmations
//! - [`datetime`]: [`LocalDateTime`] timestamp formatting
//!
//! # Examples
//!
//! ```rust
//! use waymark_core::display::OperationStatus;
//!
//! let status = OperationStatus::success("Reverted change set 3");
//! assert_eq!(status.to_string(), "Success: Reverted change set 3\n");
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;
pub mod status;

pub use collections::ChangeSetSummaries;
pub use datetime::LocalDateTime;
pub use results::{AnalysisResults, RevertResult, ValidationResult};
pub use status::OperationStatus;
