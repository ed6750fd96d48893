//! Plain-text and wiki-markup summaries of a test suite.
//!
//! Before tests run only the commands are listed; afterwards each command
//! is followed by its start, end, exit code and output file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::TestOutcome;

const TIME_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Rendered test summary carried by every notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub text: String,
    pub markup: String,
}

impl TestSummary {
    /// Summary listing only the commands about to run.
    pub fn planned(commands: &[String]) -> Self {
        Self {
            text: commands
                .iter()
                .map(|c| format!("Command: {c}"))
                .collect::<Vec<_>>()
                .join("\n"),
            markup: commands
                .iter()
                .map(|c| format!("# {c}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Full summary including each command's results.
    pub fn finished(outcomes: &[TestOutcome]) -> Self {
        let mut text = Vec::new();
        let mut markup = Vec::new();

        for outcome in outcomes {
            text.push(format!("Command: {}", outcome.command));
            text.push(format!(" - Start: {}", fmt_time(outcome.start)));
            text.push(format!(" - End:   {}", fmt_time(outcome.end)));
            text.push(format!(" - Code:  {}\n", outcome.code));

            markup.push(format!("# {}", outcome.command));
            markup.push(format!("* Start:  {}", fmt_time(outcome.start)));
            markup.push(format!("* End:    {}", fmt_time(outcome.end)));
            markup.push(format!("* Code:   {}", outcome.code));
            markup.push(format!("* Output: {}\n", outcome.output_path.display()));
        }

        Self {
            text: text.join("\n"),
            markup: markup.join("\n"),
        }
    }
}

fn fmt_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}
