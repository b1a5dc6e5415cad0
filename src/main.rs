use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

// Import the library
use vast_tracker::beacon::{BeaconDispatcher, DispatcherConfig, ReqwestTransport};
use vast_tracker::captions::CaptionTrack;
use vast_tracker::{fetch, parser};

/// VAST ad measurement toolbox
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a VAST file or URL into the ad model
    Parse {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Fire a single tracking beacon and wait for the outcome
    Beacon {
        /// The beacon URL
        #[arg(short, long)]
        url: String,

        /// Event name used in log lines
        #[arg(short, long, default_value = "manual")]
        event: String,
    },

    /// Look up the active caption cue at a playback position
    Captions {
        /// Path to the caption (VTT) file
        #[arg(short, long)]
        input: PathBuf,

        /// Playback position in milliseconds
        #[arg(short, long)]
        at: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Parse { input, pretty } => {
            // Fetch the VAST content asynchronously
            let content = fetch::fetch_vast(input).await?;

            // Parse into the ad model; malformed input degrades to empty
            let creative = parser::parse(&content);

            if *pretty {
                println!("{creative:#?}");
            } else {
                println!("{creative:?}");
            }
        }
        Commands::Beacon { url, event } => {
            let url = url::Url::parse(url)?;
            let config = DispatcherConfig::default();
            let transport = Arc::new(ReqwestTransport::new(&config)?);
            let dispatcher = BeaconDispatcher::new(transport, &config);

            // Deliver inline so the process sees the retries through
            dispatcher.deliver(&url, event).await;
        }
        Commands::Captions { input, at } => {
            let content = tokio::fs::read_to_string(input).await?;
            let mut track = CaptionTrack::new();
            track.load(&content);

            match track.text_at(*at) {
                Some(text) => println!("{text}"),
                None => println!("(no caption at {at}ms)"),
            }
        }
    }

    Ok(())
}
