use std::io::BufRead;

use clap::Subcommand;
use serde_json::json;

use super::{open_app, print_json};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the text generation API key
    SetKey {
        /// The key; read from stdin when omitted
        key: Option<String>,
    },
    /// Show whether a key is configured
    Status,
    /// Remove the stored key
    Clear,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;
    let keys = app.keys();

    match action {
        AuthAction::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => {
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line
                }
            };
            if key.trim().is_empty() {
                return Err("API key must not be empty".into());
            }
            keys.set(&key)?;
            println!("API key saved ({:?} backend)", keys.backend());
        }
        AuthAction::Status => {
            print_json(&json!({
                "configured": keys.is_configured(),
                "backend": keys.backend(),
            }))?;
        }
        AuthAction::Clear => {
            keys.clear()?;
            println!("API key removed");
        }
    }
    Ok(())
}
