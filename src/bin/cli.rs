// Interview Signal Server CLI validation tool.
// Exercises the signaling protocol against a running server, either as an
// interactive client or through automated validation scenarios.

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Parser)]
#[command(name = "signal-cli")]
#[command(about = "Interview Signal Server CLI validation tool", long_about = None)]
struct Cli {
    /// Server host:port
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Get client-facing server configuration
    Config,

    /// Test WebSocket connection
    Connect,

    /// Check a room password against the job store
    CheckPassword {
        /// Room code of the interview job
        #[arg(short, long)]
        room_id: String,

        /// Password to verify
        #[arg(short, long)]
        password: String,
    },

    /// Join a room in the given role and print incoming messages
    JoinRoom {
        /// Room id to join
        #[arg(short, long)]
        room_id: String,

        /// Role: interviewer or candidate
        #[arg(long)]
        role: String,

        /// Keep the connection alive (press Ctrl+C to exit)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Run automated protocol validation scenarios
    Validate {
        /// Run all validation scenarios
        #[arg(short, long)]
        all: bool,

        /// Run one scenario: admission-order | pairing | room-full | relay
        #[arg(long)]
        scenario: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let ws_url = format!("ws://{}/signal", cli.server);
    let http_url = format!("http://{}", cli.server);

    let result = match cli.command {
        Commands::Health => check_health(&http_url).await,
        Commands::Config => fetch_config(&http_url).await,
        Commands::Connect => test_connect(&ws_url).await,
        Commands::CheckPassword { room_id, password } => {
            check_password(&ws_url, &room_id, &password).await
        }
        Commands::JoinRoom {
            room_id,
            role,
            keep_alive,
        } => join_room(&ws_url, &room_id, &role, keep_alive).await,
        Commands::Validate { all, scenario } => run_validation(&ws_url, all, scenario).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

async fn check_health(base_url: &str) -> CliResult {
    let resp = reqwest::get(format!("{}/signal/health", base_url)).await?;
    let status = resp.status();
    let body: Value = resp.json().await?;
    if status.is_success() && body["status"] == "healthy" {
        println!("{} {}", "✓".green().bold(), "server is healthy".green());
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    } else {
        Err(format!("unexpected health response ({}): {}", status, body).into())
    }
}

async fn fetch_config(base_url: &str) -> CliResult {
    let body: Value = reqwest::get(format!("{}/signal/config", base_url))
        .await?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn test_connect(ws_url: &str) -> CliResult {
    let (stream, _) = connect_async(ws_url).await?;
    println!("{} connected to {}", "✓".green().bold(), ws_url.cyan());
    drop(stream);
    Ok(())
}

async fn open(ws_url: &str) -> Result<(WsSink, WsSource), Box<dyn std::error::Error + Send + Sync>> {
    let (stream, _) = connect_async(ws_url).await?;
    Ok(stream.split())
}

async fn send_json(sink: &mut WsSink, value: Value) -> CliResult {
    sink.send(Message::Text(value.to_string())).await?;
    Ok(())
}

async fn next_json(source: &mut WsSource, wait: Duration) -> Option<Value> {
    loop {
        match timeout(wait, source.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(&text).ok();
            }
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

async fn check_password(ws_url: &str, room_id: &str, password: &str) -> CliResult {
    let (mut sink, mut source) = open(ws_url).await?;
    send_json(
        &mut sink,
        json!({ "type": "check-password", "roomId": room_id, "password": password }),
    )
    .await?;

    match next_json(&mut source, Duration::from_secs(2)).await {
        Some(reply) if reply["type"] == "password-is-correct" => {
            println!(
                "{} password accepted for room {}",
                "✓".green().bold(),
                reply["roomId"].as_str().unwrap_or(room_id).cyan()
            );
            Ok(())
        }
        Some(reply) if reply["type"] == "error" => {
            Err(format!("rejected: {}", reply["message"]).into())
        }
        Some(reply) => Err(format!("unexpected reply: {}", reply).into()),
        None => Err("timed out waiting for reply".into()),
    }
}

async fn join_room(ws_url: &str, room_id: &str, role: &str, keep_alive: bool) -> CliResult {
    let (mut sink, mut source) = open(ws_url).await?;
    send_json(
        &mut sink,
        json!({ "type": "join-room", "roomId": room_id, "role": role }),
    )
    .await?;
    println!(
        "{} join-room sent for {} as {}",
        "→".blue().bold(),
        room_id.cyan(),
        role.yellow()
    );

    if keep_alive {
        println!("listening for messages, Ctrl+C to exit");
        loop {
            tokio::select! {
                message = next_json(&mut source, Duration::from_secs(3600)) => {
                    match message {
                        Some(value) => println!("{} {}", "←".magenta().bold(), value),
                        None => {
                            println!("{}", "connection closed".yellow());
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\nbye");
                    break;
                }
            }
        }
    } else if let Some(reply) = next_json(&mut source, Duration::from_secs(2)).await {
        if reply["type"] == "error" {
            return Err(format!("rejected: {}", reply["message"]).into());
        }
        println!("{} {}", "←".magenta().bold(), reply);
    } else {
        println!("{} seated (no immediate reply)", "✓".green().bold());
    }

    Ok(())
}

async fn run_validation(ws_url: &str, all: bool, scenario: Option<String>) -> CliResult {
    let scenarios: Vec<&str> = match (all, scenario.as_deref()) {
        (true, _) | (false, None) => vec!["admission-order", "pairing", "room-full", "relay"],
        (false, Some(name)) => vec![name],
    };

    let mut failures = 0;
    for name in scenarios {
        print!("{} {} ... ", "test".bold(), name);
        let result = match name {
            "admission-order" => validate_admission_order(ws_url).await,
            "pairing" => validate_pairing(ws_url).await,
            "room-full" => validate_room_full(ws_url).await,
            "relay" => validate_relay(ws_url).await,
            other => Err(format!("unknown scenario: {}", other).into()),
        };
        match result {
            Ok(()) => println!("{}", "ok".green().bold()),
            Err(e) => {
                println!("{} ({})", "FAILED".red().bold(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        Err(format!("{} scenario(s) failed", failures).into())
    } else {
        println!("{}", "all scenarios passed".green().bold());
        Ok(())
    }
}

fn scenario_room(prefix: &str) -> String {
    // Fresh room per run so repeated validations do not collide
    format!("{}-{}", prefix, std::process::id())
}

async fn validate_admission_order(ws_url: &str) -> CliResult {
    let room = scenario_room("cli-order");
    let (mut sink, mut source) = open(ws_url).await?;
    send_json(
        &mut sink,
        json!({ "type": "join-room", "roomId": room, "role": "candidate" }),
    )
    .await?;

    let reply = next_json(&mut source, Duration::from_secs(2))
        .await
        .ok_or("no reply to candidate-first join")?;
    if reply["type"] == "error" && reply["message"] == "Please wait for the interviewer to join" {
        Ok(())
    } else {
        Err(format!("unexpected reply: {}", reply).into())
    }
}

async fn validate_pairing(ws_url: &str) -> CliResult {
    let room = scenario_room("cli-pair");
    let (mut interviewer_sink, mut interviewer_source) = open(ws_url).await?;
    let (mut candidate_sink, _candidate_source) = open(ws_url).await?;

    send_json(
        &mut interviewer_sink,
        json!({ "type": "join-room", "roomId": room, "role": "interviewer" }),
    )
    .await?;
    sleep(Duration::from_millis(100)).await;
    send_json(
        &mut candidate_sink,
        json!({ "type": "join-room", "roomId": room, "role": "candidate" }),
    )
    .await?;

    let reply = next_json(&mut interviewer_source, Duration::from_secs(2))
        .await
        .ok_or("interviewer never received user-joined")?;
    if reply["type"] == "user-joined" {
        Ok(())
    } else {
        Err(format!("unexpected reply: {}", reply).into())
    }
}

async fn validate_room_full(ws_url: &str) -> CliResult {
    let room = scenario_room("cli-full");
    let (mut interviewer_sink, _a) = open(ws_url).await?;
    let (mut candidate_sink, _b) = open(ws_url).await?;
    let (mut third_sink, mut third_source) = open(ws_url).await?;

    send_json(
        &mut interviewer_sink,
        json!({ "type": "join-room", "roomId": room, "role": "interviewer" }),
    )
    .await?;
    sleep(Duration::from_millis(100)).await;
    send_json(
        &mut candidate_sink,
        json!({ "type": "join-room", "roomId": room, "role": "candidate" }),
    )
    .await?;
    sleep(Duration::from_millis(100)).await;
    send_json(
        &mut third_sink,
        json!({ "type": "join-room", "roomId": room, "role": "candidate" }),
    )
    .await?;

    let reply = next_json(&mut third_source, Duration::from_secs(2))
        .await
        .ok_or("no reply to third join")?;
    if reply["type"] == "error" && reply["message"] == "Room is full" {
        Ok(())
    } else {
        Err(format!("unexpected reply: {}", reply).into())
    }
}

async fn validate_relay(ws_url: &str) -> CliResult {
    let room = scenario_room("cli-relay");
    let (mut interviewer_sink, mut interviewer_source) = open(ws_url).await?;
    let (mut candidate_sink, _candidate_source) = open(ws_url).await?;

    send_json(
        &mut interviewer_sink,
        json!({ "type": "join-room", "roomId": room, "role": "interviewer" }),
    )
    .await?;
    sleep(Duration::from_millis(100)).await;
    send_json(
        &mut candidate_sink,
        json!({ "type": "join-room", "roomId": room, "role": "candidate" }),
    )
    .await?;

    // Drain the user-joined notification first
    let joined = next_json(&mut interviewer_source, Duration::from_secs(2))
        .await
        .ok_or("interviewer never received user-joined")?;
    if joined["type"] != "user-joined" {
        return Err(format!("expected user-joined, got {}", joined).into());
    }

    send_json(
        &mut candidate_sink,
        json!({ "type": "offer", "roomId": room, "offer": { "sdp": "v=0 cli-probe" } }),
    )
    .await?;

    let reply = next_json(&mut interviewer_source, Duration::from_secs(2))
        .await
        .ok_or("interviewer never received the offer")?;
    if reply["type"] == "offer" && reply["offer"]["sdp"] == "v=0 cli-probe" {
        Ok(())
    } else {
        Err(format!("unexpected reply: {}", reply).into())
    }
}
