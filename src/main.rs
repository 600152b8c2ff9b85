//! rust-torrent-core - Main entry point
//!
//! Command-line front end over the torrent core library.

use std::path::Path;

use anyhow::{Context, Result};
use rust_torrent_core::bencode;
use rust_torrent_core::cli::{CliArgs, Command, Config, ProgressDisplay};
use rust_torrent_core::tracker::HttpTransport;
use rust_torrent_core::{PeerAddress, PeerIdGenerator, TorrentClient, TorrentMetadata, TorrentParser};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse_args();
    init_logging(&args);
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args);
    config.validate().context("Invalid configuration")?;

    let result = run(args.command, &config).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

/// Initialize tracing; logs go to stderr, command output to stdout
fn init_logging(args: &CliArgs) {
    let level = args.log_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.is_verbose() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    debug!("Logging initialized at level {:?}", level);
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Decode { value } => decode_command(&value, config),
        Command::Info { torrent } => info_command(&torrent, config).await,
        Command::Peers { torrent } => {
            let metadata = load_torrent(&torrent).await?;
            let peers = client(config)?
                .peers(&metadata)
                .await
                .context("Failed to query tracker")?;
            if config.json {
                println!("{}", serde_json::to_string_pretty(&peers)?);
            } else {
                for peer in peers {
                    println!("{}", peer);
                }
            }
            Ok(())
        }
        Command::Handshake { torrent, peer } => handshake_command(&torrent, peer, config).await,
        Command::DownloadPiece { output, torrent, index } => {
            let metadata = load_torrent(&torrent).await?;
            let piece = client(config)?
                .download_piece(&metadata, index)
                .await
                .with_context(|| format!("Failed to download piece {}", index))?;
            write_output(&output, &piece).await?;
            println!("Piece {} downloaded to {}.", index, output.display());
            Ok(())
        }
        Command::Download { output, torrent } => {
            let metadata = load_torrent(&torrent).await?;
            let progress = ProgressDisplay::new(config.is_quiet()).into_callback();
            let data = client(config)?
                .download(&metadata, Some(progress))
                .await
                .context("Download failed")?;
            write_output(&output, &data).await?;
            println!("Downloaded {} to {}.", torrent.display(), output.display());
            Ok(())
        }
    }
}

fn decode_command(value: &str, config: &Config) -> Result<()> {
    let decoded = bencode::decode(value.as_bytes()).context("Failed to decode bencoded value")?;
    let json = decoded.to_json();
    if config.json {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", json);
    }
    Ok(())
}

async fn info_command(torrent: &Path, config: &Config) -> Result<()> {
    let metadata = load_torrent(torrent).await?;
    let hashes: Vec<String> = metadata.piece_hashes().map(hex::encode).collect();

    if config.json {
        let summary = serde_json::json!({
            "tracker_url": metadata.announce,
            "name": metadata.name,
            "length": metadata.length,
            "info_hash": metadata.info_hash.to_hex(),
            "piece_length": metadata.piece_length,
            "piece_hashes": hashes,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Tracker URL: {}", metadata.announce);
    println!("Length: {}", metadata.length);
    println!("Info Hash: {}", metadata.info_hash);
    println!("Piece Length: {}", metadata.piece_length);
    println!("Piece Hashes:");
    for hash in hashes {
        println!("{}", hash);
    }
    Ok(())
}

async fn handshake_command(torrent: &Path, peer: PeerAddress, config: &Config) -> Result<()> {
    let metadata = load_torrent(torrent).await?;
    let remote = client(config)?
        .handshake(&metadata, peer)
        .await
        .with_context(|| format!("Handshake with {} failed", peer))?;

    if config.json {
        println!("{}", serde_json::json!({ "peer": peer, "peer_id": remote }));
    } else {
        println!("Peer ID: {}", remote);
    }
    Ok(())
}

fn client(config: &Config) -> Result<TorrentClient<HttpTransport>> {
    let transport = HttpTransport::new(config.tracker_timeout).context("Failed to create HTTP client")?;
    let mut peer_ids = PeerIdGenerator::from_entropy();
    Ok(TorrentClient::new(transport, config.client, &mut peer_ids))
}

/// Load and parse the torrent file
async fn load_torrent(path: &Path) -> Result<TorrentMetadata> {
    info!("Loading torrent file: {}", path.display());
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read torrent file '{}'", path.display()))?;
    debug!("Torrent file size: {} bytes", data.len());

    TorrentParser::parse_bytes(&data)
        .with_context(|| format!("Failed to parse torrent file '{}'", path.display()))
}

async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    info!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
