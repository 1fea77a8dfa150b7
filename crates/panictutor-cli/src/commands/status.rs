use super::{open_app, print_json};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;
    print_json(&app.status()?)
}
