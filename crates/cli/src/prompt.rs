//! Answers rerun confirmations from the terminal.

use colored::*;
use mp_core::resume::Prompt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Receiver;

/// Ask each prompt on stdout and read the answer from stdin.
///
/// Anything other than `y`/`yes` counts as "no", and so does end of input.
pub async fn answer_from_stdin(mut prompts_rx: Receiver<Prompt>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(prompt) = prompts_rx.recv().await {
        print!(
            "{}\n{} {} ",
            prompt.title.bold().yellow(),
            prompt.message,
            "[y/N]".dimmed()
        );
        let _ = std::io::stdout().flush();

        let answer = match lines.next_line().await {
            Ok(Some(line)) => is_yes(&line),
            Ok(None) | Err(_) => false,
        };
        prompt.answer(answer);
    }
}

fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }
}
