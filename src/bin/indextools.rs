use clap::Parser;
use indextools::cancel::CancellationToken;
use indextools::cli::{Cli, Command};
use indextools::driver;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let result = match &cli.command {
        Command::Partition(args) => driver::run(args, &cancel),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
