//! Console client for the Twenty Questions server
//!
//! Prints every message the server sends. Whenever a message ends in a prompt
//! the next line typed on stdin is sent back.
//!
//! Usage:
//!   cargo run --bin twenty-questions-client -- --host 127.0.0.1 --port 5000

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use twenty_questions::channel::tcp::frame_codec;
use twenty_questions::utils::is_prompt;

#[derive(Parser)]
#[command(name = "twenty-questions-client")]
#[command(about = "Play Twenty Questions against another player from the terminal")]
struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "5000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);

    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Could not connect to {}", addr))?;
    let mut framed = Framed::new(stream, frame_codec());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    while let Some(frame) = framed.next().await {
        let frame = frame.context("Connection error")?;
        let message = String::from_utf8_lossy(&frame).into_owned();

        if !is_prompt(&message) {
            println!("{}", message);
            continue;
        }

        print!("{}", message);
        std::io::stdout().flush()?;

        match stdin.next_line().await? {
            Some(line) => framed.send(Bytes::from(line)).await?,
            // stdin closed
            None => break,
        }
    }

    println!("\nDisconnected from server.");
    Ok(())
}
