use berth::cli::{handle_completions, handle_config_init, pools, schedule, Cli, Commands, ConfigCommands};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => berth::cli::serve::run_serve(args).await,
        Commands::Schedule(args) => schedule::run_schedule(&args),
        Commands::Pools(args) => match pools::run_pools(&args) {
            Ok(output) => {
                println!("{}", output);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    // Exit explicitly so a pending stdin read cannot hold the runtime open.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
