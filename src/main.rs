use anyhow::{Context, Result};
use std::io::IsTerminal;
use smallsh::Interpreter;
use smallsh::config::{Config, LOG_ENV, ShellArgs};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: ShellArgs = argh::from_env();

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .without_time()
        .with_target(false)
        .init();

    let mut shell = Interpreter::new(Config::from(&args));
    let status = match args.command.as_deref() {
        Some(line) => shell.run_line(line).unwrap_or_else(|e| {
            eprintln!("smallsh: {e}");
            1
        }),
        None => {
            shell.install_signal_handling()?;
            shell.repl().context("line editor failed")?
        }
    };
    std::process::exit(status)
}
