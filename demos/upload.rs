//! Upload - send a file from disk without running the polling loop.
//!
//! Uses the `start`/`shutdown` pair to enter the running state just long
//! enough to make a few calls.
//!
//! # Running
//!
//! ```sh
//! BOT_TOKEN=123456:ABC-DEF CHAT_ID=10885151 cargo run --example upload -- ./report.pdf
//! ```

use botwire::{Bot, InputFile, Request};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args().nth(1).ok_or("usage: upload <file>")?;
    let chat_id: i64 = std::env::var("CHAT_ID")?.parse()?;

    let bot = Bot::builder(std::env::var("BOT_TOKEN")?).build()?;
    bot.start().await?;
    let me = bot.me();
    let username = me["username"].as_str().unwrap_or("unknown");
    println!("Logged in as @{}", username);

    let sent = bot
        .call(
            Request::new("sendDocument")
                .arg("chat_id", chat_id)
                .arg("caption", format!("Uploaded by @{}", username))
                .file(InputFile::from_path("document", &path)),
        )
        .await;

    if sent.ok() {
        println!("Sent message {}", sent["message_id"]);
    } else {
        eprintln!(
            "Upload failed ({}): {}",
            sent.error_code().unwrap_or_default(),
            sent.description().unwrap_or_default()
        );
    }

    bot.shutdown().await;
    Ok(())
}
