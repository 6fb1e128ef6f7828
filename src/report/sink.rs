//! Where user-facing run output goes
//!
//! The engine and formatter never print directly; they emit [`Event`]s to a
//! [`ReportSink`]. The CLI installs a [`ConsoleSink`], tests a [`MemorySink`].

use console::{style, Color};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::time::Duration;

use crate::cicd::threshold::Verdict;
use crate::error::Stage;
use crate::fmt::{CHECKMARK, CROSSMARK, PACKAGE, SPARKLES, WARNING};

use super::table::TabularReport;

/// Severity of a free-form notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Neutral information
    Info,
    /// Something completed
    Success,
    /// Something the user should look at; never changes the exit status
    Warning,
}

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Measurement of `packages` packages is about to start
    RunStarted {
        /// Number of packages
        packages: usize,
    },
    /// A package's pipeline started
    PackageStarted {
        /// Package name
        package: String,
    },
    /// A package's pipeline finished, successfully or not
    PackageFinished {
        /// Package name
        package: String,
    },
    /// A package was measured and classified
    Report {
        /// Package name
        package: String,
        /// Pass/fail outcome
        verdict: Verdict,
        /// Formatted sizes
        table: TabularReport,
    },
    /// A package's pipeline failed
    PackageFailed {
        /// Package name
        package: String,
        /// Stage that failed
        stage: Stage,
        /// Human-readable cause
        message: String,
    },
    /// Free-form message
    Notice {
        /// Severity
        level: Level,
        /// Text
        message: String,
    },
    /// All packages finished
    RunFinished {
        /// Packages that passed
        passed: usize,
        /// Packages that failed or could not be measured
        failed: usize,
    },
}

/// Receives run output
pub trait ReportSink: Send + Sync {
    /// Sink name
    fn name(&self) -> &str;

    /// Handle one event
    fn emit(&self, event: Event);

    /// Shorthand for a notice
    fn notice(&self, level: Level, message: &str) {
        self.emit(Event::Notice {
            level,
            message: message.to_string(),
        });
    }
}

/// Styled terminal output with a progress bar for monorepo runs
///
/// In CI mode output is plain text and no progress bar is drawn.
pub struct ConsoleSink {
    ci: bool,
    stderr: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    /// Create a console sink
    pub fn new(ci: bool) -> Self {
        Self {
            ci,
            stderr: false,
            bar: Mutex::new(None),
        }
    }

    /// Write to stderr instead of stdout (keeps stdout for machine output)
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    fn paint(&self, text: impl Into<String>, color: Color, bold: bool) -> String {
        let text = text.into();
        if self.ci {
            return text;
        }
        let styled = style(text).fg(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }

    fn print(&self, text: &str) {
        let write = || {
            if self.stderr {
                eprintln!("{}", text);
            } else {
                println!("{}", text);
            }
        };
        match self.bar.lock().as_ref() {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }

    /// Step the bar; it is cleared once every package has finished
    fn advance(&self) {
        let mut slot = self.bar.lock();
        let done = match slot.as_ref() {
            Some(bar) => {
                bar.inc(1);
                bar.length().is_some_and(|len| bar.position() >= len)
            }
            None => false,
        };
        if done {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn start_bar(&self, packages: usize) {
        let bar = ProgressBar::new(packages as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        *self.bar.lock() = Some(bar);
    }
}

impl ReportSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn emit(&self, event: Event) {
        match event {
            Event::RunStarted { packages } => {
                if !self.ci && packages > 1 {
                    self.start_bar(packages);
                }
            }
            Event::PackageStarted { package } => {
                if let Some(bar) = self.bar.lock().as_ref() {
                    bar.set_message(package);
                }
            }
            Event::PackageFinished { .. } => self.advance(),
            Event::Report {
                package,
                verdict,
                table,
            } => {
                let (mark, color) = if verdict.passed {
                    (CHECKMARK, Color::Green)
                } else {
                    (CROSSMARK, Color::Red)
                };
                let mut text = format!("\n{} {}\n", PACKAGE, self.paint(package, Color::Cyan, true));
                text.push_str(&table.render());
                text.push_str(&format!("{} {}", mark, self.paint(verdict.percent.to_string(), color, true)));
                self.print(&text);
            }
            Event::PackageFailed {
                package,
                stage,
                message,
            } => {
                self.print(&format!(
                    "\n{} {}",
                    CROSSMARK,
                    self.paint(format!("{}: {} stage failed: {}", package, stage, message), Color::Red, false)
                ));
            }
            Event::Notice { level, message } => {
                let text = match level {
                    Level::Info => message,
                    Level::Success => format!("{} {}", SPARKLES, self.paint(message, Color::Green, false)),
                    Level::Warning => format!("{} {}", WARNING, self.paint(message, Color::Yellow, false)),
                };
                self.print(&text);
            }
            Event::RunFinished { passed, failed } => {
                if let Some(bar) = self.bar.lock().take() {
                    bar.finish_and_clear();
                }
                let total = passed + failed;
                let text = if failed == 0 {
                    format!(
                        "\n{} {}",
                        CHECKMARK,
                        self.paint(format!("{} of {} packages within tolerance", passed, total), Color::Green, true)
                    )
                } else {
                    format!(
                        "\n{} {}",
                        CROSSMARK,
                        self.paint(format!("{} of {} packages failed", failed, total), Color::Red, true)
                    )
                };
                self.print(&text);
            }
        }
    }
}

/// In-memory sink for tests
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Notices of the given level
    pub fn notices(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Notice { level: l, message } if *l == level => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ReportSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}
