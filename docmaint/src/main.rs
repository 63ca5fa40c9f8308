use std::io;

use clap::Parser;
use docmaint_core::{CosmosClient, DocmaintConfig};
use tracing_subscriber::{fmt, EnvFilter};

use docmaint::health;
use docmaint::{Console, Session, SessionOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "DOCMAINT_CONFIG", default_value = "docmaint.toml")]
    config: String,

    /// Check that every declared container is reachable, then exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match DocmaintConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging on stderr so it stays out of the prompts
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let client = match CosmosClient::new(config.cosmos.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create Cosmos DB client: {}", e);
            std::process::exit(1);
        }
    };
    let options = SessionOptions::from(&config);

    if args.health {
        let mut healthy = true;
        for (name, result) in health::check_containers(&client, &options).await {
            match result {
                Ok(info) => println!(
                    "✅ {}/{} (partition key {:?})",
                    client.database(),
                    name,
                    info.partition_key_paths()
                ),
                Err(e) => {
                    healthy = false;
                    println!("❌ {}/{}: {}", client.database(), name, e);
                }
            }
        }
        if !healthy {
            std::process::exit(1);
        }
        println!("✅ Cosmos DB health check passed");
        return Ok(());
    }

    tracing::info!(database = client.database(), "Starting maintenance session");

    let stdin = io::stdin();
    let console = Console::new(stdin.lock(), io::stdout());
    let mut session = Session::new(&client, options, console);

    // The session contains its own failures; whatever ends it, exit cleanly.
    if let Err(e) = session.run().await {
        tracing::error!(error = %e, "Session ended abnormally");
        eprintln!("docmaint: {}", e);
    }

    Ok(())
}
