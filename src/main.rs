use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use tokio::io::{AsyncBufReadExt, BufReader};

use palaver::core::config;
use palaver::core::controller::ConversationController;
use palaver::inference::{GeminiBackend, Role};

#[derive(Parser)]
#[command(name = "palaver", about = "Terminal chat for a generative-language API")]
struct Args {
    /// Model to converse with (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // File logger: stdout belongs to the conversation.
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create("palaver.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = config::load_config().unwrap_or_else(|e| {
        warn!("Config error: {e}, falling back to defaults");
        config::PalaverConfig::default()
    });
    let resolved = config::resolve(&file_config, args.model.as_deref());
    info!("Palaver starting up with model: {}", resolved.model_name);

    let backend = Arc::new(GeminiBackend::new(
        resolved.api_key,
        resolved.model_name,
        Some(resolved.base_url),
    ));
    let mut controller = ConversationController::new(backend);

    controller.init().await;
    if let Some(notice) = controller.error.take() {
        eprintln!("warning: {notice}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }

        controller.pending_input = line.clone();
        let before = controller.messages().len();
        controller.submit(&line).await;

        if controller.messages().len() > before
            && let Some(reply) = controller.messages().last()
            && reply.role == Role::Assistant
        {
            println!("{}", reply.text);
        }
        if let Some(notice) = controller.error.take() {
            eprintln!("notice: {notice}");
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}
