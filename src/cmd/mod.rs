//! Command handlers for the size-diff CLI
//!
//! Each submodule handles one subcommand.

pub mod completions;
pub mod init;
pub mod run;

pub use completions::cmd_completions;
pub use init::cmd_init;
pub use run::cmd_run;
