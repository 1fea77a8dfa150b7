use clap::Subcommand;
use panictutor_core::MonitorPhase;
use tokio_util::sync::CancellationToken;

use super::{open_app, print_json};

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Run the compliance monitor until Ctrl-C
    Run,
    /// Run a single compliance check and print the outcome
    Once,
}

pub async fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;
    let monitor = app.monitor();

    match action {
        MonitorAction::Once => {
            print_json(&monitor.run_cycle().await?)?;
        }
        MonitorAction::Run => {
            let shutdown = CancellationToken::new();
            let mut states = monitor.subscribe();
            let handle = monitor.clone().spawn(shutdown.clone());

            loop {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => {
                        signal?;
                        tracing::info!("interrupt received, stopping monitor");
                        shutdown.cancel();
                        break;
                    }
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = states.borrow_and_update().clone();
                        if matches!(state.phase, MonitorPhase::Sleeping | MonitorPhase::ErrorBackoff) {
                            println!("{}", serde_json::to_string(&state)?);
                        }
                    }
                }
            }

            handle.await?;
            print_json(&monitor.state())?;
        }
    }
    Ok(())
}
