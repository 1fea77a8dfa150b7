use std::io::{BufRead, Write};

use clap::Subcommand;
use panictutor_core::{PendingQuestion, QuizResponse, StudyCandidate, StudyItem};
use serde_json::json;

use super::{open_app, print_json};

/// Typed instead of an answer to skip the question.
const SKIP_TOKEN: &str = ":skip";

#[derive(Subcommand)]
pub enum StudyAction {
    /// List what can be marked as studied, numbered for `study mark`
    Candidates,
    /// Take the quiz for the chosen candidates; passing marks them studied
    Mark {
        /// Candidate numbers from `study candidates`
        #[arg(required_unless_present = "all")]
        numbers: Vec<usize>,
        /// Quiz every candidate not yet studied today
        #[arg(long)]
        all: bool,
    },
    /// Every study record, newest first
    History,
    /// Delete records older than N days
    Purge {
        /// Defaults to retention.study_record_days
        #[arg(long)]
        days: Option<i64>,
    },
}

fn select(
    candidates: Vec<StudyCandidate>,
    numbers: &[usize],
    all: bool,
) -> Result<Vec<StudyItem>, Box<dyn std::error::Error>> {
    if all {
        return Ok(candidates
            .into_iter()
            .filter(|c| !c.studied_today)
            .map(|c| c.item)
            .collect());
    }
    numbers
        .iter()
        .map(|&n| {
            n.checked_sub(1)
                .and_then(|i| candidates.get(i))
                .map(|c| c.item.clone())
                .ok_or_else(|| Box::<dyn std::error::Error>::from(format!("no study candidate numbered {n}")))
        })
        .collect()
}

fn ask(pending: &PendingQuestion) -> Result<QuizResponse, std::io::Error> {
    let mut err = std::io::stderr().lock();
    writeln!(
        err,
        "[{}/{}] {} (period {}, test {})",
        pending.position, pending.total, pending.item.subject, pending.item.period, pending.item.date
    )?;
    writeln!(err, "Q: {}", pending.question.prompt)?;
    write!(err, "A ({SKIP_TOKEN} to skip)> ")?;
    err.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    if line == SKIP_TOKEN {
        Ok(QuizResponse::Skip)
    } else {
        Ok(QuizResponse::Answer(line.to_string()))
    }
}

pub async fn run(action: StudyAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app()?;

    match action {
        StudyAction::Candidates => {
            let numbered: Vec<_> = app
                .study_candidates()?
                .into_iter()
                .enumerate()
                .map(|(i, c)| json!({ "number": i + 1, "candidate": c }))
                .collect();
            print_json(&numbered)?;
        }
        StudyAction::Mark { numbers, all } => {
            let items = select(app.study_candidates()?, &numbers, all)?;
            if items.is_empty() {
                return Err("nothing to quiz".into());
            }

            let mut quiz = app.start_quiz(items);
            while let Some(pending) = quiz.next_question().await? {
                let response = tokio::task::spawn_blocking(move || ask(&pending)).await??;
                let outcome = quiz.answer(response)?;
                let verdict = if outcome.skipped {
                    "skipped".to_string()
                } else if outcome.passed {
                    "correct".to_string()
                } else {
                    format!("wrong, expected: {}", outcome.question.expected_answer)
                };
                eprintln!("  -> {verdict}");
            }

            let summary = quiz.finish(app.notifier()).await?;
            print_json(&summary)?;
        }
        StudyAction::History => {
            print_json(&app.ledger().history()?)?;
        }
        StudyAction::Purge { days } => {
            let days = days.unwrap_or(app.config().retention.study_record_days);
            let removed = app.ledger().purge_older_than(days)?;
            print_json(&json!({ "removed": removed, "older_than_days": days }))?;
        }
    }
    Ok(())
}
