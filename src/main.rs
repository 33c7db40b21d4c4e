//! `solace` client binary: a terminal chat loop against the relay.
//!
//! Commands: `quit`/`exit`/`q` ends the session, `reset`/`r` starts a fresh
//! conversation, `list` prints stored conversations, `delete` removes the
//! active one. Anything else is sent as a chat turn.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use solace_chat::chat::{ConversationStore, JsonFileStore, TurnController, TurnOutcome};
use solace_chat::config::ClientConfig;
use solace_chat::relay::HttpRelay;
use solace_chat::sync::{SyncCoordinator, SyncStatus};

fn main() -> ExitCode {
    // Default to warnings only so logs stay out of the chat prompt.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(run_client()) {
        eprintln!("Client error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn run_client() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ClientConfig::from_env();
    config.validate()?;
    let trust = config.resolve_trust()?;

    let store = Arc::new(JsonFileStore::open(&config.store.path));
    let relay = Arc::new(HttpRelay::new(&config.relay.base_url)?);
    let (sync, mut outcomes) = SyncCoordinator::new(relay.clone(), store.clone(), trust);

    // Replication outcomes go to the log, never to the prompt.
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            match outcome.status {
                SyncStatus::Completed => {
                    tracing::debug!(conversation = %outcome.conversation, op = ?outcome.op, "sync completed");
                }
                SyncStatus::Skipped => {
                    tracing::debug!(conversation = %outcome.conversation, op = ?outcome.op, "sync skipped");
                }
                SyncStatus::Failed(err) => {
                    tracing::warn!(conversation = %outcome.conversation, op = ?outcome.op, %err, "sync failed");
                }
            }
        }
    });

    let mut controller = TurnController::new(store.clone(), relay, sync);

    print_banner(&config);

    let stdin = std::io::stdin();
    loop {
        print!("\nyou: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => {}
            "quit" | "exit" | "q" => {
                println!("\ncounselor: Thank you for talking with me. Take care.");
                break;
            }
            "reset" | "r" => {
                controller.reset();
                println!("\n[system] conversation reset");
            }
            "list" => {
                let stored = store.load().await?;
                if stored.is_empty() {
                    println!("\n[system] no stored conversations");
                } else {
                    println!();
                    for conversation in &stored {
                        println!(
                            "  {} ({} messages)",
                            conversation.title,
                            conversation.messages.len()
                        );
                    }
                }
            }
            "delete" => {
                if controller.delete_active().await? {
                    println!("\n[system] conversation deleted");
                } else {
                    println!("\n[system] no active conversation");
                }
            }
            _ => {
                println!("\n[system] thinking...");
                match controller.send_turn(input).await? {
                    TurnOutcome::Completed { reply, .. } => {
                        println!("\ncounselor: {reply}");
                    }
                    TurnOutcome::Recovered { conversation } => {
                        if let Some(last) = conversation.messages.last() {
                            println!("\ncounselor: {}", last.content);
                        }
                    }
                    TurnOutcome::Rejected(_) => {}
                }
            }
        }
    }

    Ok(())
}

fn print_banner(config: &ClientConfig) {
    println!("============================================================");
    println!("  Solace - counseling chat client");
    println!("  relay: {}", config.relay.base_url);
    println!("============================================================");
    println!("  quit/exit/q to leave, reset/r for a new conversation,");
    println!("  list for stored conversations, delete to remove the");
    println!("  active one");
    println!("============================================================");
}
