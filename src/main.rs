//! Cognifix terminal front-end
//!
//! Reads turns from stdin and prints progress lines as they arrive.
//! Lines starting with `/` are commands:
//!
//! - `/attach <image|audio|video|file> <path>` queues an attachment for the next turn
//! - `/reset` starts a new conversation
//! - `/quit` exits

use cognifix::llm::{LlmConfig, ModelRegistry};
use cognifix::{
    channel, Attachment, ChatItem, ConversationSession, FsResolver, ProgressEvent,
    RegistryLlmClient, SessionConfig, ToolConfig, ToolRegistry,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum Command {
    Attach(ChatItem),
    Reset,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.splitn(3, ' ');
    let command = match (parts.next(), parts.next(), parts.next()) {
        (Some("quit" | "exit"), _, _) => Command::Quit,
        (Some("reset"), _, _) => Command::Reset,
        (Some("attach"), Some(kind), Some(path)) => {
            let attachment = Attachment::new(path.trim());
            match kind {
                "image" => Command::Attach(ChatItem::Image(attachment)),
                "audio" => Command::Attach(ChatItem::Audio(attachment)),
                "video" => Command::Attach(ChatItem::Video(attachment)),
                "file" => Command::Attach(ChatItem::File(attachment)),
                other => Command::Unknown(format!("unknown attachment kind: {other}")),
            }
        }
        _ => Command::Unknown(format!("unknown command: {line}")),
    };
    Some(command)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cognifix=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
    }

    let llm = RegistryLlmClient::new(
        Arc::clone(&llm_registry),
        llm_registry.default_model_id().to_string(),
    );
    let tools = ToolRegistry::standard(ToolConfig::from_env());
    let config = SessionConfig::from_env();
    let greeting = config.greeting.clone();
    let mut session = ConversationSession::new(llm, tools, FsResolver::default(), config);

    println!("{greeting}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Vec<ChatItem> = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Some(Command::Quit) => break,
            Some(Command::Reset) => {
                session.reset();
                pending.clear();
                println!("{greeting}");
                continue;
            }
            Some(Command::Attach(item)) => {
                pending.push(item);
                continue;
            }
            Some(Command::Unknown(message)) => {
                eprintln!("{message}");
                continue;
            }
            None => {}
        }

        let mut items = std::mem::take(&mut pending);
        items.push(ChatItem::text(line));

        let (emitter, mut stream) = channel();
        let printer = tokio::spawn(async move {
            let mut streamed = false;
            while let Some(event) = stream.next().await {
                match event {
                    ProgressEvent::AnswerDelta { text } => {
                        streamed = true;
                        print!("{text}");
                    }
                    // already printed piecewise
                    ProgressEvent::Final { .. } if streamed => println!(),
                    other => println!("{}", other.to_wire()),
                }
            }
        });

        // the progress stream already showed the user any failure
        if let Err(e) = session.send(items, emitter).await {
            tracing::debug!(session_id = %session.id(), error = %e, "Turn ended without an answer");
        }
        printer.await?;
    }

    Ok(())
}
