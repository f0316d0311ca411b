use anyhow::{Context, Result};
use clap::Parser;
use listing_sync::console::{CommandParser, ConsoleObserver, HELP};
use listing_sync::{Command, Config, Dashboard, HttpRemote};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "listing-sync",
    about = "Follow a listings dashboard from the terminal"
)]
struct Args {
    /// Config file (default: ~/.config/listing-sync/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dashboard base URL, overriding the config file
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

/// Read stdin line by line, forwarding parsed commands until EOF or `quit`.
async fn read_commands(mut parser: CommandParser, tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                break;
            }
        };

        match parser.parse(&line) {
            Ok(Some(command)) => {
                let quit = command == Command::Quit;
                if tx.send(command).await.is_err() || quit {
                    return;
                }
            }
            Ok(None) if line.trim() == "help" => println!("{}", HELP),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }
    // The signal task still holds a sender, so EOF has to quit explicitly
    let _ = tx.send(Command::Quit).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path().context("HOME environment variable not set")?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    config.validate().context("Invalid configuration")?;
    tracing::debug!(?config, "Effective configuration");

    let base_url = config.base_url()?;
    let remote = HttpRemote::new(&base_url, config.session(), config.request_timeout())
        .context("Failed to create HTTP client")?;

    let observer = ConsoleObserver::new(std::io::stdout());
    let mut dashboard = Dashboard::new(
        Arc::new(remote),
        config.policies(),
        config.settings.clone(),
        Box::new(observer),
    );

    let (command_tx, command_rx) = mpsc::channel::<Command>(32);

    tokio::spawn(read_commands(
        CommandParser::new(config.settings.clone()),
        command_tx.clone(),
    ));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            let _ = command_tx.send(Command::Quit).await;
        }
    });

    println!("Following {} (type 'help' for commands)", base_url);
    dashboard.run(command_rx).await?;

    println!("Goodbye!");
    Ok(())
}
