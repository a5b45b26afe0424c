//! The canonical `vmrelay` argument surface (spec §6), parsed with `clap`.
//! This is deliberately *not* consulted when the process is invoked under a
//! symlink — see [`crate::main`]'s dispatch, which decides which of these
//! two parsing strategies applies before anything here runs.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "vmrelay", about = "native client for a split JVM launcher")]
pub struct Cli {
    /// Start the server if it isn't already running, then exit.
    #[arg(short = 'S', long = "start")]
    pub start: bool,

    /// Stop a running server, then exit.
    #[arg(short = 'K', long = "stop")]
    pub stop: bool,

    /// Report whether a server is running, then exit.
    #[arg(short = 's', long = "status")]
    pub status: bool,

    /// Additional classpath entry, repeatable.
    #[arg(short = 'j', value_name = "PATH")]
    pub classpath: Vec<String>,

    /// Restart the server even if one is already running.
    #[arg(short = 'R', long = "restart")]
    pub restart: bool,

    /// Tool name, followed by its arguments, forwarded verbatim.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub tool_and_args: Vec<String>,
}

impl Cli {
    pub fn tool(&self) -> Option<&str> {
        self.tool_and_args.first().map(String::as_str)
    }

    pub fn tool_args(&self) -> &[String] {
        self.tool_and_args.get(1..).unwrap_or(&[])
    }
}
