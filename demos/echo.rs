//! Echo bot - replies to every text message with the same text.
//!
//! This example demonstrates:
//! - Creating a bot with the builder pattern
//! - A fallback handler for updates no command matched
//! - A command handler and calling API methods from handlers
//!
//! # Running
//!
//! ```sh
//! BOT_TOKEN=123456:ABC-DEF RUST_LOG=debug cargo run --example echo
//! ```

use botwire::{Bot, Envelope, HandlerResult, Request};
use tracing_subscriber::EnvFilter;

async fn start(bot: Bot, update: Envelope) -> HandlerResult {
    let chat_id = update["message"]["chat"]["id"].as_i64();
    let name = update["message"]["from"]["first_name"].as_str().unwrap_or("there");

    bot.call(
        Request::new("sendMessage")
            .arg("chat_id", chat_id)
            .arg("text", format!("Hi {name}! Send me anything and I will send it back.")),
    )
    .await;
    Ok(())
}

async fn echo(bot: Bot, update: Envelope) -> HandlerResult {
    let message = &update["message"];
    let Some(text) = message["text"].as_str() else {
        return Ok(());
    };

    let sent = bot
        .call(
            Request::new("sendMessage")
                .arg("chat_id", message["chat"]["id"].as_i64())
                .arg("text", text)
                .arg("reply_to_message_id", message["message_id"].as_i64()),
        )
        .await;

    if !sent.ok() {
        return Err(format!("sendMessage failed: {}", sent.description().unwrap_or_default()).into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bot = Bot::builder(std::env::var("BOT_TOKEN")?)
        .timeout(30)
        .command("start", start)
        .on_update(echo)
        .build()?;

    bot.run().await?;
    Ok(())
}
