//! Completions command implementation
//!
//! Handles the `size-diff completions` command which generates
//! shell completion scripts for bash, zsh, fish, etc.

use std::io::Write;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;

/// Generate shell completion scripts
///
/// Outputs completion script for the specified shell to stdout.
/// Users can redirect this to their shell's completion directory.
///
/// # Examples
///
/// ```bash
/// # Bash
/// size-diff completions bash > /etc/bash_completion.d/size-diff
///
/// # Zsh
/// size-diff completions zsh > ~/.zfunc/_size-diff
///
/// # Fish
/// size-diff completions fish > ~/.config/fish/completions/size-diff.fish
/// ```
pub fn cmd_completions(shell: Shell) {
    write_completions(shell, &mut std::io::stdout());
}

/// Write the completion script for `shell` into `out`
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "size-diff", out);
}
