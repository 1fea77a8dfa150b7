use super::{open_app, print_json};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;
    let payload = app.send_reminder_now().await?;
    print_json(&payload)
}
