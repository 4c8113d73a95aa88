use anyhow::Result;
use clap::{Parser, Subcommand};
use flockmem::{create_router, ClusterDocument, NodeConfig, NodeDaemon};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flockmem")]
#[command(about = "Partitioned, replicated distributed shared memory node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(short, long, default_value = "flockmem.toml")]
        config: PathBuf,
    },
    Init {
        #[arg(short, long, default_value = "flockmem.toml")]
        config: PathBuf,
    },
    /// Writes the partition config document every node loads at startup.
    Generate {
        #[arg(short, long, default_value = "1000")]
        total_addresses: u32,

        #[arg(short, long, default_value = "1")]
        replication_factor: usize,

        #[arg(short, long, value_delimiter = ',', default_value = "NodeA,NodeB,NodeC,NodeD")]
        nodes: Vec<String>,

        #[arg(short, long, default_value = "dsm_config.json")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flockmem=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config: config_path } => {
            run_node(config_path).await?;
        }
        Commands::Init { config: config_path } => {
            init_config(config_path)?;
        }
        Commands::Generate {
            total_addresses,
            replication_factor,
            nodes,
            out,
        } => {
            let document = ClusterDocument::generate(total_addresses, replication_factor, nodes)?;
            document.save(&out)?;
            println!(
                "Configuration file {:?} generated with {} roles",
                out,
                document.roles().len()
            );
        }
    }

    Ok(())
}

async fn run_node(config_path: PathBuf) -> Result<()> {
    let config = if config_path.exists() {
        info!("Loading config from {:?}", config_path);
        NodeConfig::load(&config_path)?
    } else {
        info!("Config file not found, using defaults");
        NodeConfig::default()
    };

    let daemon = Arc::new(NodeDaemon::new(config.clone())?);
    let router = create_router(daemon.clone());

    let listener = TcpListener::bind(&config.listen_addr()).await?;
    info!("API server listening on {}", config.listen_addr());

    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("API server error: {}", e);
        }
    });

    let daemon_clone = daemon.clone();
    let daemon_handle = tokio::spawn(async move {
        if let Err(e) = daemon_clone.run().await {
            error!("Daemon error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    daemon.shutdown();
    api_handle.abort();

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), daemon_handle).await;

    Ok(())
}

fn init_config(config_path: PathBuf) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!("Config file already exists: {:?}", config_path);
    }

    let config = NodeConfig::default();
    config.save(&config_path)?;
    println!("Created config file: {:?}", config_path);
    println!("\nEdit the config file to:");
    println!("  - Set this node's name as it appears in the cluster document");
    println!("  - List every peer's name and host:port");
    println!("  - Point cluster_file at the output of `flockmem generate`");

    Ok(())
}
