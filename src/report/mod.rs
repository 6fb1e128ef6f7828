//! Turning diffs into something people read
//!
//! [`table`] lays a [`DiffResult`](crate::diff::DiffResult) out as rows and
//! columns, [`comment`] renders a review comment body, and [`sink`] is where
//! the run's user-facing output goes.

pub mod comment;
pub mod sink;
pub mod table;

pub use comment::render_comment;
pub use sink::{ConsoleSink, Event, Level, MemorySink, ReportSink};
pub use table::{format, TabularReport};
