use clap::Subcommand;
use panictutor_core::schedule::{format_test_date, parse_test_date, PERIOD_COUNT};
use panictutor_core::{Grade, ScheduleEntry};
use serde_json::json;

use super::{open_app, print_json};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Add or replace the subjects for a test date
    Add {
        /// Test date (YYYY/MM/DD or YYYY-MM-DD)
        date: String,
        /// Subjects in period order; pass "" for a free period
        #[arg(required = true, num_args = 1..=PERIOD_COUNT)]
        subjects: Vec<String>,
    },
    /// List upcoming and past test dates
    List,
    /// Delete a test date
    Delete {
        date: String,
        /// Delete even within a week of the test
        #[arg(long)]
        force: bool,
    },
    /// Record the grade for one period
    Grade {
        date: String,
        /// Period number (1-6)
        period: u8,
        /// S, A, B, C, F, Q or NONE
        grade: String,
    },
    /// Delete every test date
    Clear,
}

fn canonical_date(raw: &str) -> Result<String, Box<dyn std::error::Error>> {
    Ok(format_test_date(parse_test_date(raw)?))
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;

    match action {
        ScheduleAction::Add { date, subjects } => {
            let entry = ScheduleEntry::new(canonical_date(&date)?, subjects);
            app.schedule().upsert(&entry)?;
            print_json(&entry)?;
        }
        ScheduleAction::List => {
            print_json(&app.schedule_view()?)?;
        }
        ScheduleAction::Delete { date, force } => {
            let date = canonical_date(&date)?;
            app.schedule().delete(&date, force)?;
            print_json(&json!({ "deleted": date }))?;
        }
        ScheduleAction::Grade {
            date,
            period,
            grade,
        } => {
            let grade: Grade = grade.parse()?;
            let entry = app.schedule().set_grade(&canonical_date(&date)?, period, grade)?;
            print_json(&entry)?;
        }
        ScheduleAction::Clear => {
            app.schedule().clear_all()?;
            print_json(&json!({ "cleared": true }))?;
        }
    }
    Ok(())
}
