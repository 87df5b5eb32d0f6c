//! The `generate` command's argument parsing, config resolution, and
//! validation logic, kept separate from `main.rs` so it is testable
//! without spawning a process.

pub mod cli;
pub mod error;
pub mod lockfile;
pub mod run;

pub use cli::{Cli, Command, GenerateArgs};
pub use error::CliError;
pub use run::{exit_code, run};
