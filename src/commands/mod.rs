//! CLI commands implementation

pub mod ask;
pub mod chat;
pub mod datasources;
pub mod init;
pub mod properties;
pub mod status;

pub use ask::*;
pub use chat::*;
pub use datasources::*;
pub use init::*;
pub use properties::*;
pub use status::*;

use crate::error::Result;
use std::io::{self, BufRead, Write};

/// Ask a yes/no question on the terminal; anything but y/yes is "no"
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
