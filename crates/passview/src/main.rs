mod bindings;
mod cli;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    if cli.list {
        return run::list(&cli);
    }
    run::run(cli)
}
