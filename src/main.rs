use clap::Parser;
use policyset::cli::{handle_completions, handle_config_init, run, Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan(args) => run::run_plan(args).await,
        Commands::Apply(args) => run::run_apply(args).await,
        Commands::Show(args) => run::run_show(args).await,
        Commands::Destroy(args) => run::run_destroy(args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
