use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Bisect, Fuzz};

/// A trait for running our various commands.
trait RunCommand {
    fn run_command(&self) -> Result<()>;
}

#[derive(Clone, Debug, Parser)]
#[command(version, about = "Drive a fuzz session or a progression bisection locally")]
enum Command {
    /// Run one fuzz session against a target binary
    Fuzz(Fuzz),

    /// Bisect a known crash down to the revision pair where it was fixed
    Bisect(Bisect),
}

impl RunCommand for Command {
    fn run_command(&self) -> Result<()> {
        match self {
            Command::Fuzz(x) => x.run_command(),
            Command::Bisect(x) => x.run_command(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    Command::parse().run_command()
}
