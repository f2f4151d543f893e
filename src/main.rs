use blox3d::cli::{Cli, Commands};
use blox3d::output::Printer;
use blox3d::Config;
use clap::Parser;
use miette::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let printer = Printer::new();
    let config = match &cli.command {
        Commands::Completions(_) => Config::default(),
        _ => cli.load_config()?,
    };

    match cli.command {
        Commands::Parse(args) => blox3d::cli::parse::run(args, config, &printer)?,
        Commands::Info(args) => blox3d::cli::info::run(args, config, &printer)?,
        Commands::Validate(args) => {
            if !blox3d::cli::validate::run(args, config, &printer) {
                std::process::exit(1);
            }
        }
        Commands::Completions(args) => blox3d::cli::completions::run(args),
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings, or debug with `-v`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
