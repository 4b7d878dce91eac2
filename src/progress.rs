//! Progress display for the long-running stages.
//!
//! Stages add work as they discover it and advance once per finished unit, from whichever worker
//! finished it. The pipeline closes each phase. `NoProgress` is the default everywhere;
//! `ProgressBars` draws one indicatif bar per phase on stderr.

use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {prefix:>13.bold} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";
const PHASE_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sizes,
    Hashing,
    Moving,
}

impl Phase {
    fn index(self) -> usize {
        match self {
            Phase::Sizes => 0,
            Phase::Hashing => 1,
            Phase::Moving => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Phase::Sizes => "Checking sizes",
            Phase::Hashing => "Hashing",
            Phase::Moving => "Moving",
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    /// `units` more items will be processed in `phase`.
    fn add_work(&self, phase: Phase, units: u64);
    /// One item of `phase` is done.
    fn advance(&self, phase: Phase);
    fn finish(&self, phase: Phase);
}

/// Draws nothing.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn add_work(&self, _phase: Phase, _units: u64) {}
    fn advance(&self, _phase: Phase) {}
    fn finish(&self, _phase: Phase) {}
}

/// Bars only make sense on an interactive terminal with human-readable logs.
pub fn bars_enabled(json: bool, stderr_is_tty: bool) -> bool {
    !json && stderr_is_tty
}

/// One bar per phase, created on first use.
pub struct ProgressBars {
    multi: MultiProgress,
    bars: Mutex<[Option<ProgressBar>; PHASE_COUNT]>,
}

impl ProgressBars {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new([None, None, None]),
        }
    }

    /// Bars for the terminal, or `NoProgress` when they would garble the output.
    pub fn for_terminal(json: bool) -> Box<dyn ProgressReporter> {
        if bars_enabled(json, atty::is(atty::Stream::Stderr)) {
            Box::new(Self::new())
        } else {
            Box::new(NoProgress)
        }
    }

    fn bar(&self, phase: Phase) -> Option<ProgressBar> {
        let bars = match self.bars.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        bars[phase.index()].clone()
    }

    fn bar_or_create(&self, phase: Phase) -> ProgressBar {
        let mut bars = match self.bars.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        bars[phase.index()]
            .get_or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new(0));
                pb.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█>-"),
                );
                pb.set_prefix(phase.label());
                pb
            })
            .clone()
    }

    #[cfg(test)]
    fn position(&self, phase: Phase) -> Option<(u64, Option<u64>)> {
        self.bar(phase).map(|pb| (pb.position(), pb.length()))
    }
}

impl Default for ProgressBars {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressBars {
    fn add_work(&self, phase: Phase, units: u64) {
        self.bar_or_create(phase).inc_length(units);
    }

    fn advance(&self, phase: Phase) {
        if let Some(pb) = self.bar(phase) {
            pb.inc(1);
        }
    }

    fn finish(&self, phase: Phase) {
        if let Some(pb) = self.bar(phase) {
            pb.finish_with_message("done");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_track_added_and_finished_work() {
        let bars = ProgressBars::with_target(ProgressDrawTarget::hidden());
        bars.add_work(Phase::Hashing, 2);
        bars.add_work(Phase::Hashing, 3);
        for _ in 0..4 {
            bars.advance(Phase::Hashing);
        }
        assert_eq!(bars.position(Phase::Hashing), Some((4, Some(5))));
        // a phase with no work never gets a bar
        bars.advance(Phase::Moving);
        assert_eq!(bars.position(Phase::Moving), None);
        bars.finish(Phase::Hashing);
    }

    #[test]
    fn json_or_pipes_disable_bars() {
        assert!(bars_enabled(false, true));
        assert!(!bars_enabled(true, true));
        assert!(!bars_enabled(false, false));
    }
}
