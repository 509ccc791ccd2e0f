//! CLI for PopRelay
//!
//! Subcommands:
//! - `broker`: run the relay until Ctrl-C
//! - `publish`: send messages under a topic
//! - `subscribe`: print every payload received for a topic

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use poprelay::client::{HandlerArgs, HandlerError, MessageHandler, Publisher, Subscriber};
use poprelay::config::{LoggingSettings, Settings, load_config};
use poprelay::transport::Endpoint;
use poprelay::utils::logging;
use tracing::{error, info};

const READY_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `publish` lingers so queued frames reach the broker.
const FLUSH_DELAY: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "poprelay", about = "Topic-filtered publish/subscribe relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the broker
    Broker {
        /// Port publishers connect to
        #[arg(long)]
        ingress_port: Option<u16>,
        /// Port subscribers connect to
        #[arg(long)]
        egress_port: Option<u16>,
    },
    /// Publish messages under a topic
    Publish {
        #[arg(long)]
        topic: String,
        /// Broker host (defaults to client.broker_host)
        #[arg(long)]
        host: Option<String>,
        /// Broker ingress port (defaults to broker.ingress_port)
        #[arg(long)]
        port: Option<u16>,
        /// Messages to send, in order
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Subscribe to a topic and print payloads
    Subscribe {
        #[arg(long)]
        topic: String,
        /// Broker host (defaults to client.broker_host)
        #[arg(long)]
        host: Option<String>,
        /// Broker egress port (defaults to broker.egress_port)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(&LoggingSettings::default());
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging);

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Broker {
            ingress_port,
            egress_port,
        } => run_broker(settings, ingress_port, egress_port).await,
        Command::Publish {
            topic,
            host,
            port,
            messages,
        } => run_publish(settings, &topic, host, port, &messages).await,
        Command::Subscribe { topic, host, port } => {
            run_subscribe(settings, &topic, host, port).await
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_broker(
    mut settings: Settings,
    ingress_port: Option<u16>,
    egress_port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = ingress_port {
        settings.broker.ingress_port = port;
    }
    if let Some(port) = egress_port {
        settings.broker.egress_port = port;
    }

    let mut handle = poprelay::broker::server::start_with_settings(&settings.broker).await?;

    tokio::select! {
        _ = handle.wait() => {
            error!("Broker exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
    handle.stop().await;

    Ok(())
}

async fn run_publish(
    settings: Settings,
    topic: &str,
    host: Option<String>,
    port: Option<u16>,
    messages: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = Endpoint::new(
        host.unwrap_or(settings.client.broker_host.clone()),
        port.unwrap_or(settings.broker.ingress_port),
    );
    let publisher = Publisher::with_settings(endpoint, topic, &settings.client)?;
    publisher.wait_connected(READY_TIMEOUT).await?;

    for message in messages {
        publisher.send(message);
    }
    tokio::time::sleep(FLUSH_DELAY).await;
    publisher.stop();

    Ok(())
}

async fn run_subscribe(
    settings: Settings,
    topic: &str,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = Endpoint::new(
        host.unwrap_or(settings.client.broker_host.clone()),
        port.unwrap_or(settings.broker.egress_port),
    );

    let mut args = HandlerArgs::new();
    args.insert("topic".to_string(), serde_json::Value::from(topic));
    let handler: Arc<dyn MessageHandler> =
        Arc::new(|payload: &str, args: &HandlerArgs| -> Result<(), HandlerError> {
            let topic = args.get("topic").and_then(|t| t.as_str()).unwrap_or_default();
            println!("[{topic}] {payload}");
            Ok(())
        });

    let handle = Subscriber::with_settings(endpoint, topic, handler, args, &settings.client)?.run();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");
    handle.stop().await;

    Ok(())
}
