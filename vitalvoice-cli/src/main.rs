//! vitalvoice-cli: a terminal client for the VitalVoice HTTP API
//!
//! Sends typed utterances through the same `/chat/message` route the voice
//! client uses, so classifier behaviour can be checked without a microphone.
//!
//! # Subcommands
//! - `chat <text> --user <id> [--language <lang>] [--json]`  route one utterance
//! - `reminders --user <id> [--json]`                        list saved reminders
//! - `status`                                                show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "vitalvoice-cli", version, about = "VitalVoice assistant from the terminal")]
struct Cli {
    /// VitalVoice HTTP server URL (overrides VITALVOICE_HTTP_URL env var)
    #[arg(long, env = "VITALVOICE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send one utterance to the assistant
    Chat {
        /// What the user said
        text: String,

        /// User id the conversation belongs to
        #[arg(short, long, env = "VITALVOICE_USER")]
        user: String,

        /// Reply language (e.g. "Hindi"); English when omitted
        #[arg(short, long)]
        language: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List a user's reminders
    Reminders {
        #[arg(short, long, env = "VITALVOICE_USER")]
        user: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show VitalVoice server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SavedReminder {
    pub id: String,
    pub title: String,
    pub date: String,
    pub time: String,
}

/// The body of a successful POST /chat/message
#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub emergency_detected: bool,
    #[serde(default)]
    pub emergency_confidence: f64,
    #[serde(default)]
    pub reminder_detected: bool,
    #[serde(default)]
    pub reminder_confidence: f64,
    pub reminder_result: Option<SavedReminder>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderList {
    pub reminders: Vec<SavedReminder>,
}

// ============================================================================
// Text Output
// ============================================================================

/// Human-readable rendering of a chat reply: the message, then any flags.
pub fn render_chat(reply: &ChatReply) -> String {
    let mut out = reply.message.clone();
    if reply.emergency_detected {
        out.push_str(&format!(
            "\n\n[emergency detected, confidence {:.0}%]",
            reply.emergency_confidence * 100.0
        ));
    }
    if let Some(r) = &reply.reminder_result {
        out.push_str(&format!("\n\n[saved] {}", render_reminder(r)));
    } else if reply.reminder_detected {
        out.push_str(&format!(
            "\n\n[reminder intent, confidence {:.0}%, not saved]",
            reply.reminder_confidence * 100.0
        ));
    }
    out
}

pub fn render_reminder(r: &SavedReminder) -> String {
    let short_id: String = r.id.chars().take(8).collect();
    format!("{} {} {}  {}", r.date, r.time, r.title, short_id)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Fail with the server's error message when the status is not 2xx.
fn check(resp: reqwest::blocking::Response, url: &str) -> anyhow::Result<serde_json::Value> {
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("unknown error");
        anyhow::bail!("{} returned {}: {}", url, status, msg);
    }
    Ok(body)
}

fn do_chat(
    server: &str,
    text: &str,
    user: &str,
    language: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let url = format!("{}/chat/message", server);
    let body = serde_json::json!({
        "input": text,
        "userId": user,
        "language": language,
    });

    // Completion calls can take a while
    let resp = client(60)?.post(&url).json(&body).send()?;
    let body = check(resp, &url)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let reply: ChatReply = serde_json::from_value(body)?;
        println!("{}", render_chat(&reply));
    }
    Ok(())
}

fn do_reminders(server: &str, user: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/reminders", server);
    let resp = client(10)?.get(&url).query(&[("userId", user)]).send()?;
    let body = check(resp, &url)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let list: ReminderList = serde_json::from_value(body)?;
    if list.reminders.is_empty() {
        eprintln!("No reminders for {}", user);
    }
    for r in &list.reminders {
        println!("{}", render_reminder(r));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("VitalVoice server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:           {}", body["version"].as_str().unwrap_or("?"));
            println!("Storage:           {}", body["storage"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:        {}", pg);
            }
        }
        Ok(r) => {
            eprintln!("vitalvoice-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("vitalvoice-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Chat { text, user, language, json } => {
            do_chat(&server, &text, &user, language.as_deref(), json)
        }
        Commands::Reminders { user, json } => do_reminders(&server, &user, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("vitalvoice-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
