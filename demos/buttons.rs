//! Buttons bot - inline keyboard with callback patterns.
//!
//! `/vote` sends a message with two buttons. Presses are routed by the
//! `vote:(yes|no)` pattern; the press is acknowledged automatically once
//! the handler returns. `/quit` stops the bot.
//!
//! # Running
//!
//! ```sh
//! BOT_TOKEN=123456:ABC-DEF cargo run --example buttons
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use botwire::{Bot, CallbackMatch, Envelope, HandlerResult, Request};
use serde_json::json;
use tracing_subscriber::EnvFilter;

async fn vote(bot: Bot, update: Envelope) -> HandlerResult {
    let keyboard = json!({
        "inline_keyboard": [[
            {"text": "Yes", "callback_data": "vote:yes"},
            {"text": "No", "callback_data": "vote:no"}
        ]]
    });

    bot.call(
        Request::new("sendMessage")
            .arg("chat_id", update["message"]["chat"]["id"].as_i64())
            .arg("text", "Do you like Rust?")
            .arg("reply_markup", keyboard),
    )
    .await;
    Ok(())
}

async fn quit(bot: Bot, _update: Envelope) -> HandlerResult {
    bot.stop();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let tally = Arc::new([AtomicU64::new(0), AtomicU64::new(0)]);

    let bot = {
        let tally = tally.clone();
        Bot::builder(std::env::var("BOT_TOKEN")?)
            .command("vote", vote)
            .command("quit", quit)
            .pattern(r"vote:(?P<choice>yes|no)", move |bot: Bot, update: Envelope, matched: CallbackMatch| {
                let slot = usize::from(matched.name("choice") == Some("no"));
                let count = tally[slot].fetch_add(1, Ordering::SeqCst) + 1;
                let query = &update["callback_query"];
                let request = Request::new("editMessageText")
                    .arg("chat_id", query["message"]["chat"]["id"].as_i64())
                    .arg("message_id", query["message"]["message_id"].as_i64())
                    .arg("text", format!("{} votes for {}", count, matched.name("choice").unwrap_or_default()));
                async move {
                    bot.call(request).await;
                    HandlerResult::Ok(())
                }
            })
            .on_disconnect(|bot: Bot| async move {
                tracing::info!("Bot @{} disconnecting", bot.me()["username"].as_str().unwrap_or_default());
                HandlerResult::Ok(())
            })
            .build()?
    };

    bot.run().await?;

    println!(
        "Final tally: {} yes, {} no",
        tally[0].load(Ordering::SeqCst),
        tally[1].load(Ordering::SeqCst)
    );
    Ok(())
}
