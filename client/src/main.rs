use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{Command, Response, ViewStatus};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "vvctl")]
#[command(about = "Video view daemon control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a media item (file path, URI or engine MRL)
    Load {
        /// What to play, e.g. rtsp://camera.local/stream1 or ~/videos/clip.mp4
        locator: String,

        /// Per-media engine option, repeatable (e.g. -o :network-caching=300)
        #[arg(short, long = "option", allow_hyphen_values = true)]
        options: Vec<String>,

        /// Start playing as soon as the media is prepared
        #[arg(short, long)]
        play: bool,
    },

    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Stop playback
    Stop,

    /// Jump to a position (milliseconds, "90s" or "1:30")
    Seek {
        position: String,
    },

    /// Skip relative to the current position (e.g. 10s, -5s, -1:00)
    Skip {
        #[arg(allow_hyphen_values = true)]
        delta: String,
    },

    /// Tear down the player
    Release,

    /// Dispatch a key press (space, left, right, ...)
    Key {
        code: String,
    },

    /// Show the view status
    Status,

    /// Check if daemon is running
    Ping,

    /// Stop the daemon
    Kill,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut commands = Vec::with_capacity(2);
    match cli.command {
        Commands::Load {
            locator,
            options,
            play,
        } => {
            commands.push(Command::Load { locator, options });
            if play {
                commands.push(Command::Play);
            }
        }
        Commands::Play => commands.push(Command::Play),
        Commands::Pause => commands.push(Command::Pause),
        Commands::Stop => commands.push(Command::Stop),
        Commands::Seek { position } => commands.push(Command::SeekTo {
            ms: parse_time(&position)?,
        }),
        Commands::Skip { delta } => commands.push(Command::Skip {
            delta_ms: parse_time(&delta)?,
        }),
        Commands::Release => commands.push(Command::Release),
        Commands::Key { code } => commands.push(Command::Key { code }),
        Commands::Status => commands.push(Command::Status),
        Commands::Ping => commands.push(Command::Ping),
        Commands::Kill => commands.push(Command::Kill),
    }

    for command in commands {
        match send_command(command).await {
            Ok(response) => handle_response(response),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                eprintln!("\nIs the daemon running? Try starting it with: vidviewd");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn send_command(command: Command) -> Result<Response> {
    let socket_path = common::get_socket_path();
    log::debug!("Sending {:?} to {}", command, socket_path.display());

    let stream = UnixStream::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // Send command
    let command_json = serde_json::to_string(&command)?;
    writer.write_all(command_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    // Read response
    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;

    let response: Response = serde_json::from_str(&response_line)?;
    Ok(response)
}

fn handle_response(response: Response) {
    match response {
        Response::Ok => {
            println!("✓ Success");
        }
        Response::Error(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
        Response::Status(status) => print_status(&status),
        Response::KeyHandled(true) => {
            println!("✓ Key handled");
        }
        Response::KeyHandled(false) => {
            println!("Key not bound");
        }
        Response::Pong => {
            println!("✓ Daemon is running");
        }
    }
}

fn print_status(status: &ViewStatus) {
    println!("View Status:");
    println!("  Version: {}", status.version);
    println!("  State: {}", status.state);
    println!(
        "  Media: {}",
        status.locator.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Position: {} / {}",
        format_time(status.position_ms),
        format_time(status.duration_ms)
    );
    println!("  Playing: {}", if status.is_playing { "yes" } else { "no" });
    println!("  Seekable: {}", if status.can_seek { "yes" } else { "no" });
    println!("  Loading: {}", if status.loading { "yes" } else { "no" });
    println!("  Prepared: {}", if status.prepared { "yes" } else { "no" });
    if status.completed {
        println!("  Completed: yes");
    }
    if let Some(layout) = &status.layout {
        println!(
            "  Layout: surface {}, container {}{}",
            layout.surface,
            layout.container,
            if layout.engine_managed {
                " (engine managed)"
            } else {
                ""
            }
        );
    }
    if let Some(error) = &status.last_error {
        println!("  Last error: {}", error);
    }
}

/// Parse a time given as milliseconds, seconds ("90s") or "[h:]m:ss"
fn parse_time(input: &str) -> Result<i64> {
    let input = input.trim();
    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    let ms = if let Some(secs) = body.strip_suffix("ms") {
        secs.parse::<i64>()?
    } else if let Some(secs) = body.strip_suffix('s') {
        (secs.parse::<f64>()? * 1000.0).round() as i64
    } else if body.contains(':') {
        let mut total: i64 = 0;
        for part in body.split(':') {
            let value: i64 = part
                .parse()
                .with_context(|| format!("Invalid time component '{}' in '{}'", part, input))?;
            total = total * 60 + value;
        }
        total * 1000
    } else {
        body.parse::<i64>()
            .with_context(|| format!("Invalid time '{}'", input))?
    };

    Ok(if negative { -ms } else { ms })
}

fn format_time(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
