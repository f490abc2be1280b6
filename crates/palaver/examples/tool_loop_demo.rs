use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use log::info;
use serde::Deserialize;
use serde_json::json;

use palaver::invocation::{Invocation, Invoker};
use palaver::memory::{JsonFileStore, Memory};
use palaver::{Settings, ToolCall};
use palaver_client::{LLMClient, OpenAIClient};
use palaver_common::{Config, Message, Parameters, Property, ToolDescriptor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Load model, prompt and store from a settings file instead of flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL for the API endpoint
    #[arg(long, default_value = "http://localhost:8080/v1")]
    base_url: String,

    /// API key for authentication
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model to use for chat completion
    #[arg(long, default_value = "ggml-org/gpt-oss-120b-GGUF")]
    model: String,

    /// Where the conversation is stored
    #[arg(long, default_value = "palaver-demo.json")]
    store: PathBuf,

    /// The user message to send
    #[arg(long, default_value = "What time is it?")]
    message: String,

    /// Maximum number of model calls
    #[arg(long, default_value = "10")]
    max_turns: u32,
}

fn time_tool() -> ToolDescriptor {
    let parameters = Parameters::new(
        [(
            "timezone".to_string(),
            Property::string("Only \"UTC\" is supported"),
        )]
        .into(),
        Vec::new(),
    );

    ToolDescriptor::new("get_current_time", parameters)
        .with_description("Get the current date and time.")
}

#[derive(Deserialize)]
struct TimeArgs {
    timezone: Option<String>,
}

fn run_tool(call: &ToolCall) -> String {
    let result = match call.function.name.as_str() {
        "get_current_time" => match call.function.parse_arguments::<TimeArgs>() {
            Ok(TimeArgs { timezone: None }) => json!({ "utc": Utc::now().to_rfc3339() }),
            Ok(TimeArgs { timezone: Some(tz) }) if tz.eq_ignore_ascii_case("utc") => {
                json!({ "utc": Utc::now().to_rfc3339() })
            }
            Ok(TimeArgs { timezone: Some(tz) }) => {
                json!({ "error": format!("unsupported timezone {tz}") })
            }
            Err(e) => json!({ "error": format!("bad arguments: {e}") }),
        },
        other => json!({ "error": format!("unknown tool {other}") }),
    };
    result.to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (invoker, memory) = if let Some(path) = &args.config {
        let settings = Settings::load_from(path)?;
        let client = OpenAIClient::new(settings.client_config()?)?;
        (settings.invoker(client)?, settings.open_memory().await?)
    } else {
        let mut config = Config::new("openai", &args.model).with_base_url(&args.base_url);
        if let Some(key) = &args.api_key {
            config = config.with_api_key(key);
        }
        let invoker = Invoker::new(
            OpenAIClient::new(config)?,
            "You always speak like a pirate. Use tools when they help.",
        );
        (invoker, Memory::new(JsonFileStore::open(&args.store).await?))
    };

    info!("Model: {}", invoker.client().config().model);
    info!("History: {} stored messages", memory.len().await?);

    let tools = vec![time_tool()];
    let start_time = Instant::now();

    memory
        .append_messages(vec![Message::user(args.message.as_str())])
        .await?;
    println!("{} {}", "User:".bold().blue(), args.message);

    for turn in 1..=args.max_turns {
        let history = memory.get_all_messages().await?;
        let reply = invoker
            .invoke(
                Invocation::builder()
                    .messages(history)
                    .tools(tools.clone())
                    .build(),
            )
            .await?;
        memory.append_messages(vec![reply.clone()]).await?;

        if reply.tool_calls.is_empty() {
            println!(
                "{} {}",
                "Assistant:".bold().green(),
                reply.text().unwrap_or_default()
            );
            break;
        }

        for call in &reply.tool_calls {
            let result = run_tool(call);
            println!(
                "{} {}({}) -> {}",
                "Tool:".bold().yellow(),
                call.function.name,
                call.function.arguments,
                result
            );
            memory.record_tool_response(&call.id, result).await?;
        }

        if turn == args.max_turns {
            println!("{}", "Stopped: turn limit reached".red());
        }
    }

    info!("Total time: {}ms", start_time.elapsed().as_millis());
    Ok(())
}
