//! Publisher launcher
//!
//! Run with: cargo run --example publisher -- ADDRESS BROKER_ADDRESS --topics T1 [T2 ...]
//!
//! Examples:
//!   # Interactive: prompt for topics and messages
//!   cargo run --example publisher -- tcp://127.0.0.1:5556 tcp://127.0.0.1:5555 --topics numbers
//!
//!   # Synthetic feed: 1000 generated messages, then the exit sentinel
//!   cargo run --example publisher -- tcp://127.0.0.1:5556 tcp://127.0.0.1:5555 \
//!       --topics numbers --random 1000

use std::io::{BufRead, Write};
use std::time::Duration;

use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;

use topicbus::{Address, Payload, Publisher, EXIT_MESSAGE, EXIT_TOPIC};

const WORDS: &[&str] = &[
    "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "bright", "river", "stone",
    "window", "garden", "signal", "message", "broker", "topic", "subtle", "winter", "summer",
    "evening",
];

/// Start publishing topics.
#[derive(Parser)]
#[command(name = "publisher", about = "Start publishing topics")]
struct Args {
    /// Address to bind this publisher to: <scheme>://<host>:<port>
    address: Address,

    /// Address of the broker to register with
    broker_address: Address,

    /// Topics to publish
    #[arg(long, num_args = 1.., required = true)]
    topics: Vec<String>,

    /// Send N generated messages on the first topic, then the exit sentinel
    #[arg(short, long, value_name = "N")]
    random: Option<u64>,

    /// Seconds to wait for connections before sending messages
    #[arg(long, default_value_t = 0.5)]
    delay: f64,
}

fn sentence() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(4..9);
    let mut words: Vec<&str> = Vec::with_capacity(len);
    for _ in 0..len {
        words.push(WORDS.choose(&mut rng).copied().unwrap_or("word"));
    }
    format!("{}.", words.join(" "))
}

async fn handle_random(publisher: &mut Publisher, topic: &str, count: u64) -> anyhow::Result<()> {
    for sent in 1..=count {
        publisher.publish(topic, sentence()).await?;
        if sent % 100 == 0 {
            println!("Sent {sent} messages");
        }
    }

    publisher.publish(EXIT_TOPIC, EXIT_MESSAGE).await?;
    println!("Sent exit sentinel");
    Ok(())
}

async fn handle_interactive(publisher: &mut Publisher) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("Enter 't' to add topic, 'q' to quit: ");
        std::io::stdout().flush()?;

        let mut option = String::new();
        stdin.lock().read_line(&mut option)?;
        match option.trim().to_lowercase().as_str() {
            "t" => {
                print!("Enter topic: ");
                std::io::stdout().flush()?;
                let mut topic = String::new();
                stdin.lock().read_line(&mut topic)?;
                let topic = topic.trim();
                if topic.is_empty() {
                    continue;
                }
                publisher.register(topic).await?;

                print!("Enter message: ");
                std::io::stdout().flush()?;
                let mut message = String::new();
                stdin.lock().read_line(&mut message)?;
                let message = message.trim();
                if !message.is_empty() {
                    publisher.publish(topic, Payload::from(message)).await?;
                }
            }
            "q" => return Ok(()),
            _ => println!("Please enter a valid option"),
        }
    }
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

    let mut publisher = Publisher::bind(args.address, args.broker_address).await?;

    for topic in &args.topics {
        publisher.register(topic).await?;
    }
    if args.random.is_some() {
        publisher.register(EXIT_TOPIC).await?;
    }

    // Let slow joiners connect before the first message goes out.
    tokio::time::sleep(Duration::from_secs_f64(args.delay)).await;

    match args.random {
        Some(count) => handle_random(&mut publisher, &args.topics[0], count).await?,
        None => handle_interactive(&mut publisher).await?,
    }

    Ok(())
}
