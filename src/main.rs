//! GrowlNet - Growl Network Transport client
//!
//! Sends notifications to the Growl daemons listed in the configuration file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use growlnet::config::{self, Config};
use growlnet::network::{NotificationHub, RecordingTransport, SentPacket, Transport, UdpTransport};
use growlnet::protocol::{self, Notification, Priority};

/// GrowlNet - Growl Network Transport client
#[derive(Parser)]
#[command(name = "growlnet")]
#[command(author = "GrowlNet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Send Growl notifications to one or more daemons over UDP", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register with every server, then send a notification
    Notify {
        /// Notification type name
        name: String,

        /// Notification title
        title: String,

        /// Notification body
        message: String,

        /// Notification priority
        #[arg(short, long, value_enum, default_value_t = Priority::Normal)]
        priority: Priority,

        /// Ask the daemon not to auto-dismiss
        #[arg(long)]
        sticky: bool,

        /// Only notify these servers (repeatable, default: all)
        #[arg(short, long = "server")]
        servers: Vec<String>,

        /// Print packets instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Send the registration packet to every server
    Register {
        /// Print packets instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// List configured servers
    Servers,

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Notify {
            name,
            title,
            message,
            priority,
            sticky,
            servers,
            dry_run,
        } => {
            let notification = Notification::new(name, title, message)
                .with_priority(priority)
                .sticky(sticky);
            run_notify(&config, &notification, &servers, dry_run).await?;
        }
        Commands::Register { dry_run } => {
            run_register(&config, dry_run).await?;
        }
        Commands::Servers => {
            print_servers(&config);
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_info();
        }
    }

    Ok(())
}

/// Pick the transport: real UDP, or an in-memory recorder for dry runs
async fn transport(dry_run: bool) -> anyhow::Result<(Arc<dyn Transport>, Option<RecordingTransport>)> {
    if dry_run {
        let recorder = RecordingTransport::new();
        let transport: Arc<dyn Transport> = Arc::new(recorder.clone());
        Ok((transport, Some(recorder)))
    } else {
        let transport: Arc<dyn Transport> = Arc::new(UdpTransport::bind().await?);
        Ok((transport, None))
    }
}

async fn build_hub(
    config: &Config,
    dry_run: bool,
) -> anyhow::Result<(NotificationHub, Option<RecordingTransport>)> {
    if config.servers.is_empty() {
        anyhow::bail!("No servers configured. Run `growlnet config --generate` for a sample.");
    }

    let (transport, recorder) = transport(dry_run).await?;
    let hub = NotificationHub::with_transport(&config.servers, &config.defaults, transport).await?;
    Ok((hub, recorder))
}

async fn run_notify(
    config: &Config,
    notification: &Notification,
    servers: &[String],
    dry_run: bool,
) -> anyhow::Result<()> {
    let (hub, recorder) = build_hub(config, dry_run).await?;
    hub.notify(notification, servers).await?;

    tracing::info!(
        "Sent '{}' to {}",
        notification.name,
        if servers.is_empty() {
            "all servers".to_string()
        } else {
            servers.join(", ")
        }
    );

    if let Some(recorder) = recorder {
        print_packets(&recorder.take());
    }
    Ok(())
}

async fn run_register(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    // Building the hub registers every server
    let (hub, recorder) = build_hub(config, dry_run).await?;
    tracing::info!("Registered with {} server(s)", hub.len());

    if let Some(recorder) = recorder {
        print_packets(&recorder.take());
    }
    Ok(())
}

fn print_packets(packets: &[SentPacket]) {
    for packet in packets {
        let hex: String = packet.bytes.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{}:{} ({} bytes) {}", packet.host, packet.port, packet.bytes.len(), hex);
    }
}

fn print_servers(config: &Config) {
    if config.servers.is_empty() {
        println!("No servers configured.");
        return;
    }

    for server in &config.servers {
        let (settings, notifications) = config.defaults.merge(server);
        println!(
            "{}: {}:{} app='{}' password={} notifications=[{}]",
            server.name,
            settings.address,
            settings.port,
            settings.app_name,
            if settings.password.is_empty() { "no" } else { "yes" },
            notifications.join(", ")
        );
    }
}

fn print_info() {
    println!("GrowlNet Protocol Information");
    println!("=============================\n");
    println!("Protocol Version: {}", protocol::PROTOCOL_VERSION);
    println!("Default Port: {}", protocol::DEFAULT_PORT);
    println!("Max Packet Size: {} bytes", protocol::MAX_PACKET_SIZE);
    println!("Max Notification Types: {}", protocol::MAX_NOTIFICATION_TYPES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["growlnet", "info"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_notify_arguments() {
        let cli = Cli::try_parse_from([
            "growlnet", "notify", "Alert", "Hi", "Body", "--priority", "emergency", "--sticky",
            "-s", "home", "-s", "office",
        ])
        .unwrap();

        match cli.command {
            Commands::Notify {
                priority,
                sticky,
                servers,
                dry_run,
                ..
            } => {
                assert_eq!(priority, Priority::Emergency);
                assert!(sticky);
                assert_eq!(servers, ["home", "office"]);
                assert!(!dry_run);
            }
            _ => panic!("expected notify"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_records_packets() {
        let mut config = Config::default();
        config
            .servers
            .push(config::ServerConfig::new("home").notifications(["Alert"]));

        let (hub, recorder) = build_hub(&config, true).await.unwrap();
        let recorder = recorder.unwrap();
        hub.notify(&Notification::new("Alert", "Hi", "Body"), &[] as &[&str])
            .await
            .unwrap();
        assert_eq!(recorder.packets().len(), 2);
    }
}
