use serde_json::json;

use super::{open_app, print_json};

pub fn run(confirmed: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        return Err("this deletes every test date and study record; pass --yes to confirm".into());
    }
    let app = open_app()?;
    app.reset_all_data()?;
    print_json(&json!({ "reset": true }))
}
