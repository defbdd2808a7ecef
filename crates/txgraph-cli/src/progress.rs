use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use txgraph_export::{Phase, Progress};

const TEMPLATE: &str = "[{prefix}] {wide_bar} {pos}/{len} blocks ({elapsed}, eta {eta})";

/// One progress bar per phase, advanced once per scheduler batch.
#[derive(Default)]
pub struct PhaseBars {
    current: RefCell<Option<ProgressBar>>,
}

impl Progress for PhaseBars {
    fn phase_started(&self, phase: Phase, total_heights: u64) {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(total_heights).with_style(style);
        bar.set_prefix(phase.to_string());

        *self.current.borrow_mut() = Some(bar);
    }

    fn heights_done(&self, _phase: Phase, heights: u64) {
        if let Some(bar) = self.current.borrow().as_ref() {
            bar.inc(heights);
        }
    }

    fn phase_finished(&self, _phase: Phase) {
        if let Some(bar) = self.current.borrow_mut().take() {
            bar.finish();
        }
    }
}
