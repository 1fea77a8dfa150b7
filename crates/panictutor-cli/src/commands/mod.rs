pub mod auth;
pub mod config;
pub mod monitor;
pub mod notifications;
pub mod remind;
pub mod reset;
pub mod schedule;
pub mod status;
pub mod study;

use std::sync::Arc;

use panictutor_core::{Config, PanicTutor};
use serde::Serialize;

use crate::console::ConsoleSink;

/// Open the on-disk app with notifications going to the terminal.
pub fn open_app() -> Result<PanicTutor, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(PanicTutor::open(config, Arc::new(ConsoleSink))?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
