use crate::cli::Cli;
use crate::errors::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

/// Write completions for `shell` to `out`
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "pstk", out);
}

/// Generate shell completions for the specified shell
pub fn generate_completions(shell: Shell) -> Result<()> {
    write_completions(shell, &mut io::stdout());
    Ok(())
}
