//! Broker launcher
//!
//! Run with: cargo run --example broker -- [--type r|d] [--address ADDR] [--port PORT]
//!
//! Examples:
//!   cargo run --example broker                         # routing broker on tcp://127.0.0.1:5555
//!   cargo run --example broker -- --type d --port 5565 # direct broker on tcp://127.0.0.1:5565

use clap::Parser;

use topicbus::{Address, Broker, BrokerConfig, BrokerKind};

/// Start a pub/sub broker.
#[derive(Parser)]
#[command(name = "broker", about = "Start a pub/sub broker")]
struct Args {
    /// Broker topology: r (routing) or d (direct)
    #[arg(short = 't', long = "type", default_value = "r")]
    broker_type: BrokerKind,

    /// Host to advertise for the registration endpoint
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Registration endpoint port
    #[arg(long, default_value_t = 5555)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("topicbus=info".parse()?),
        )
        .init();

    let config = BrokerConfig::new(args.broker_type, Address::tcp(args.address, args.port));
    let broker = Broker::bind(&config).await?;

    println!("{} broker listening on {}", broker.kind(), config.address);

    tokio::select! {
        result = broker.run() => {
            if let Err(e) = result {
                eprintln!("Broker error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
