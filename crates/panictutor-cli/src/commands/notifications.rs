use clap::Subcommand;

use super::{open_app, print_json};

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// Delivered notifications, newest first
    History {
        /// Show at most this many
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn run(action: NotificationsAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;

    match action {
        NotificationsAction::History { limit } => {
            let mut entries = app.history().list()?;
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            print_json(&entries)?;
        }
    }
    Ok(())
}
