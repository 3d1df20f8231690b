//! Interactive chat loop

use super::ask::{describe_failure, open_chatbot};
use crate::chat::Chatbot;
use crate::config::Config;
use crate::error::Result;
use crate::meta::MetaDb;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Chat with a property on stdin/stdout until `exit`, `quit` or end of input
pub async fn cmd_chat(config: &Config, db: &MetaDb, property_key: &str) -> Result<()> {
    let property = db.find_property(property_key).await?;
    let mut chatbot = open_chatbot(config, &property, config.retrieval.top_k)?;

    println!(
        "💬 Chatting with '{}' ({}) via {}. Type 'exit' or 'quit' to leave.",
        property.name,
        property.website,
        chatbot.model_name()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_repl(&mut chatbot, db, stdin, &mut stdout).await
}

/// Read questions line by line and write answers until `exit`, `quit` or end of input
pub async fn run_repl<R, W>(
    chatbot: &mut Chatbot,
    db: &MetaDb,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        write!(out, "\nYou: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        match chatbot.generate_reply(db, query).await {
            Ok(reply) => {
                writeln!(out, "Bot: {}", reply.answer.trim())?;
                if !reply.sources.is_empty() {
                    writeln!(out, "     ({})", reply.sources.join(", "))?;
                }
            }
            Err(e) => {
                debug!("Turn failed: {}", e);
                writeln!(out, "⚠️  {}", describe_failure(&e))?;
            }
        }
    }

    writeln!(out, "Goodbye!")?;
    Ok(())
}
