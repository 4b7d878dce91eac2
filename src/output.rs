//! User-facing console output.
//! Colors are used only when stdout is a TTY, so piped output stays plain.

use owo_colors::OwoColorize;

use crate::pipeline::RunSummary;

fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {msg}");
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {msg}");
    }
}

/// Plain line without prefix, for output users may script against.
pub fn print_user(msg: &str) {
    println!("{msg}");
}

/// Lines of the end-of-run report. Dry runs report "would move" counts instead of moves.
pub fn summary_lines(summary: &RunSummary, dry_run: bool) -> Vec<String> {
    let mut lines = vec![
        format!("Reference files scanned: {}", summary.reference_files),
        format!("Source files scanned:    {}", summary.source_files),
        format!("Files hashed:            {}", summary.hashed),
        format!("Duplicates found:        {}", summary.duplicates),
    ];
    if dry_run {
        lines.push(format!("Would move:              {}", summary.simulated));
    } else {
        lines.push(format!("Moved:                   {}", summary.moved));
    }
    if summary.probe_failures > 0 {
        lines.push(format!("Unreadable files:        {}", summary.probe_failures));
    }
    if summary.move_failures > 0 {
        lines.push(format!("Failed moves:            {}", summary.move_failures));
    }
    lines
}

pub fn print_summary(summary: &RunSummary, dry_run: bool) {
    for line in summary_lines(summary, dry_run) {
        print_user(&line);
    }
    if summary.is_clean() {
        print_success("Deduplication complete.");
    } else {
        print_warn(&format!(
            "{} duplicate(s) could not be moved; see the log for details.",
            summary.move_failures
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_reports_would_move() {
        let s = RunSummary {
            duplicates: 2,
            simulated: 2,
            ..Default::default()
        };
        let lines = summary_lines(&s, true);
        assert!(lines.iter().any(|l| l.starts_with("Would move:") && l.ends_with('2')));
        assert!(!lines.iter().any(|l| l.starts_with("Moved:")));
    }

    #[test]
    fn failures_only_listed_when_present() {
        let clean = summary_lines(&RunSummary::default(), false);
        assert!(!clean.iter().any(|l| l.contains("Failed")));
        let s = RunSummary {
            move_failures: 1,
            ..Default::default()
        };
        assert!(summary_lines(&s, false).iter().any(|l| l == "Failed moves:            1"));
    }
}
