use std::path::PathBuf;
use std::process;

use roxide as lox;

use clap::Parser as ClapParser;

use lox::lox::Lox;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lox source file to execute; starts a REPL when omitted
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    let mut driver: Lox = Lox::new();

    match args.script {
        Some(path) => {
            driver.run_file(&path)?;

            if driver.had_error() {
                process::exit(65);
            }

            if driver.had_runtime_error() {
                process::exit(70);
            }
        }

        None => {
            driver.run_prompt()?;
        }
    }

    Ok(())
}
