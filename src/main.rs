use colored::Colorize;
use std::process;
use tash::error::error_chain;

fn run() -> anyhow::Result<()> {
    tash::cli::run()?;
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), error_chain(&*e));
        process::exit(1);
    }
}
