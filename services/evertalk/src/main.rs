use anyhow::{Context, Result};
use clap::Parser;
use evertalk::app::{App, Flow};
use evertalk::command::{HELP, UserCommand};
use evertalk::config::Config;
use evertalk_client::{ChannelNotifier, Notice, SessionContext};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Talk your way through Evertalk episodes from the terminal")]
struct Cli {
    /// Backend address, overrides EVERTALK_API_URL
    #[arg(long)]
    api_url: Option<String>,

    /// Microphone name, overrides EVERTALK_INPUT_DEVICE
    #[arg(long)]
    device: Option<String>,

    /// Print the available microphones and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if args.list_devices {
        println!("{}", evertalk_native_utils::device::get_available_inputs()?);
        return Ok(());
    }
    if args.api_url.is_some() {
        config.api_url = args.api_url;
    }
    if args.device.is_some() {
        config.input_device = args.device;
    }

    tracing::info!("Configuration loaded successfully. Starting Evertalk...");

    // The microphone stream is not Send, so recording controllers run on
    // this thread.
    let local = tokio::task::LocalSet::new();
    local.run_until(run(config)).await
}

async fn run(config: Config) -> Result<()> {
    let client_config = config.client_config();
    let session = SessionContext::new();

    let (notifier, mut notices) = ChannelNotifier::new();
    let notifier = Arc::new(notifier);
    let api = Arc::new(
        evertalk_client::connect(&client_config, session.clone(), notifier.clone())
            .context("Failed to create the API client")?,
    );

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            print_notice(&notice);
        }
    });

    let (command_tx, mut command_rx) = tokio::sync::mpsc::channel(32);
    let mut app = App::new(
        api,
        session.clone(),
        notifier,
        command_tx,
        client_config.login_url(),
    )
    .with_input_device(config.input_device.clone())
    .with_completion_delay(config.completion_delay);

    app.boot().await;
    println!("{HELP}");

    let mut session_rx = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read input: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<UserCommand>() {
                    Ok(command) => {
                        if app.handle(command).await == Flow::Quit {
                            break;
                        }
                    }
                    Err(e) => println!("{e} (type `help`)"),
                }
            }
            Some(command) = command_rx.recv() => {
                app.handle_recording(command).await;
            }
            Ok(()) = session_rx.changed() => {
                let snapshot = session_rx.borrow_and_update().clone();
                app.on_session_change(snapshot).await;
            }
        }
    }

    app.shutdown().await;
    tracing::info!("Bye.");
    Ok(())
}

fn print_notice(notice: &Notice) {
    if notice.is_blocking() {
        println!("\n*** {notice} ***\n");
    } else {
        println!("[{notice}]");
    }
}
