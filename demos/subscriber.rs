//! Subscriber launcher
//!
//! Run with: cargo run --example subscriber -- ADDRESS BROKER_ADDRESS --topics T1 [T2 ...]
//!
//! Examples:
//!   # Routing broker
//!   cargo run --example subscriber -- tcp://127.0.0.1:5557 tcp://127.0.0.1:5555 --topics numbers
//!
//!   # Direct broker: spawn the announcement loop, exit on the sentinel
//!   cargo run --example subscriber -- tcp://127.0.0.1:5557 tcp://127.0.0.1:5565 \
//!       --topics numbers --start-listener --receive-exit

use std::collections::HashMap;

use chrono::Utc;
use clap::Parser;

use topicbus::{Address, BrokerKind, Subscriber, EXIT_TOPIC};

/// Start subscribing to topics.
#[derive(Parser)]
#[command(name = "subscriber", about = "Start subscribing to topics")]
struct Args {
    /// Address to bind this subscriber to: <scheme>://<host>:<port>
    address: Address,

    /// Address of the broker to register with
    broker_address: Address,

    /// Topics to subscribe to
    #[arg(long, num_args = 1.., required = true)]
    topics: Vec<String>,

    /// Spawn the announcement-listening loop (direct broker only)
    #[arg(long)]
    start_listener: bool,

    /// Terminate when the exit sentinel is received
    #[arg(long)]
    receive_exit: bool,
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

    let mut subscriber = Subscriber::bind(args.address, args.broker_address).await?;

    for topic in &args.topics {
        subscriber.register(topic).await?;
    }
    if args.receive_exit {
        subscriber.register(EXIT_TOPIC).await?;
    }

    if args.start_listener {
        if subscriber.broker_kind() == Some(BrokerKind::Direct) {
            let listener = subscriber.start_listener()?;
            tokio::spawn(async move {
                if let Err(e) = listener.run().await {
                    tracing::info!(error = %e, "Announcement listener stopped");
                }
            });
        } else {
            eprintln!("--start-listener ignored: broker is not DIRECT");
        }
    }

    let mut received: HashMap<String, u64> = HashMap::new();
    loop {
        let envelope = subscriber.wait_for_message().await?;
        *received.entry(envelope.topic.clone()).or_default() += 1;

        if let Some(latency) = envelope.latency_from(Utc::now()) {
            tracing::info!(
                topic = %envelope.topic,
                latency_secs = latency.num_seconds(),
                "Message received"
            );
        }

        if args.receive_exit && envelope.is_exit_sentinel() {
            println!("Exit sentinel received");
            break;
        }
    }

    println!("Received message counts:");
    for (topic, count) in &received {
        println!("  {topic}: {count}");
    }

    Ok(())
}
