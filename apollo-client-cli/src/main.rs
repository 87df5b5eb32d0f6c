//! Thin entry point: parse arguments, dispatch to [`apollo_client_cli::run`],
//! and translate the result into a process exit code (`0` on success,
//! non-zero on any thrown error).

use clap::Parser;

use apollo_client_cli::{exit_code, run, Cli, Command};

fn main() {
    let cli = Cli::parse();
    let project_root = std::env::current_dir().unwrap_or_else(|_| ".".into());

    let result = match cli.command {
        Command::Generate(args) => run(&args, &project_root).map(|_| ()),
    };

    if let Err(ref err) = result {
        tracing::error!("{err}");
        eprintln!("error: {err}");
    }

    std::process::exit(exit_code(&result));
}
