use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "poetry")]
#[command(about = "Poem ingestion and search reindexing service", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP ingestion service
    Serve,
    /// Publish a dataset from the store into a search index
    Reindex {
        dataset: String,
        index: String,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Submit a JSON file of poems to a running ingestion service
    Submit { file: PathBuf },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poetry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                poetry::cli::config::init(stdout)?;
            }
        },
        command => {
            let config = poetry::config::load_or_default(cli.config.as_deref())?;
            match command {
                Some(Commands::Reindex {
                    dataset,
                    index,
                    workers,
                }) => {
                    poetry::cli::reindex::reindex(config, &dataset, &index, workers).await?;
                }
                Some(Commands::Submit { file }) => {
                    poetry::cli::submit::submit(config, &file).await?;
                }
                Some(Commands::Serve) | Some(Commands::Config { .. }) | None => {
                    poetry::cli::serve::serve(config).await?;
                }
            }
        }
    }

    Ok(())
}
