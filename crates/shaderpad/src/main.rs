mod cli;
mod defaults;
mod diagnostics;
mod project;
mod run;
mod window;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
