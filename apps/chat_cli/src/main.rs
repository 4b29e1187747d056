use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Result;
use chat_core::{
    load_layered, ChatConfig, ConversationController, IgnoreReason, Resolution, SubmitOutcome,
};
use clap::Parser;
use shared::domain::{Message, Role};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chat", about = "Chat with an LLM inference endpoint from the terminal")]
struct Args {
    /// TOML config file; `./chat.toml` is used when present and this is unset.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
}

impl Args {
    /// File and environment layers, then these flags, validated once at the end.
    fn resolve_config(&self) -> Result<ChatConfig> {
        let mut config = load_layered(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut ChatConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Cancel,
    History,
    Say(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "/quit" | "/exit" => Command::Quit,
        "/cancel" => Command::Cancel,
        "/history" => Command::History,
        _ => Command::Say(line),
    }
}

enum Event {
    Line(Option<String>),
    Resolved(Resolution),
    Interrupt,
}

fn label(message: &Message) -> &'static str {
    if message.is_error() {
        return "error";
    }
    match message.role() {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn print_message(message: &Message) {
    println!("{}> {}", label(message), message.content());
}

fn prompt(controller: &ConversationController) -> io::Result<()> {
    let marker = if controller.is_in_flight() { "..." } else { ">" };
    print!("{marker} ");
    io::stdout().flush()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let config = args.resolve_config()?;
    info!(
        endpoint = %config.endpoint,
        model = %config.model,
        shape = config.request_shape().as_str(),
        "starting chat session"
    );

    let mut controller = ConversationController::connect(&config);
    controller.history().iter().for_each(print_message);
    prompt(&controller)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let in_flight = controller.is_in_flight();
        let event = tokio::select! {
            line = lines.next_line() => Event::Line(line?),
            Some(resolution) = controller.next_resolution(), if in_flight => Event::Resolved(resolution),
            _ = tokio::signal::ctrl_c() => Event::Interrupt,
        };

        match event {
            Event::Line(None) => break,
            Event::Line(Some(line)) => match parse_command(&line) {
                Command::Quit => break,
                Command::Cancel => {
                    if controller.cancel() {
                        println!("(cancelled)");
                    } else {
                        println!("(nothing to cancel)");
                    }
                }
                Command::History => controller.history().iter().for_each(print_message),
                Command::Say(text) => match controller.submit(text) {
                    SubmitOutcome::Started(_) | SubmitOutcome::Ignored(IgnoreReason::EmptyInput) => {}
                    SubmitOutcome::Ignored(IgnoreReason::RequestInFlight) => {
                        println!("(still waiting for the previous reply; /cancel to abort)");
                    }
                },
            },
            Event::Resolved(Resolution::Cancelled(_)) => {}
            Event::Resolved(_) => {
                if let Some(message) = controller.history().last() {
                    print_message(message);
                }
            }
            Event::Interrupt => {
                if !controller.cancel() {
                    break;
                }
                println!("(cancelled)");
            }
        }
        prompt(&controller)?;
    }

    println!();
    Ok(())
}
