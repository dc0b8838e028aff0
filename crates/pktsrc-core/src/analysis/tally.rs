use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use tracing::{debug, error, info};

use super::TsBounds;
use crate::WeirdCount;
use crate::context::Diagnostics;
use crate::source::CapturedFrame;

/// Diagnostics sink that counts dropped frames per weird name.
#[derive(Debug, Default)]
pub struct WeirdTally {
    counts: RefCell<BTreeMap<String, u64>>,
    bounds: Cell<TsBounds>,
}

impl WeirdTally {
    /// Counts sorted by name.
    pub fn counts(&self) -> Vec<WeirdCount> {
        self.counts
            .borrow()
            .iter()
            .map(|(name, count)| WeirdCount {
                name: name.clone(),
                count: *count,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.borrow().get(name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.borrow().values().sum()
    }

    pub(crate) fn bounds(&self) -> TsBounds {
        self.bounds.get()
    }
}

impl Diagnostics for WeirdTally {
    fn report_weird(&self, name: &str, frame: &CapturedFrame<'_>) {
        *self.counts.borrow_mut().entry(name.to_string()).or_insert(0) += 1;
        let mut bounds = self.bounds.get();
        bounds.observe(frame.ts());
        self.bounds.set(bounds);
        debug!(weird = name, ts = frame.ts(), caplen = frame.header.caplen, "dropped frame");
    }

    fn report_info(&self, msg: &str) {
        info!("{msg}");
    }

    fn report_internal_error(&self, msg: &str) {
        error!("internal error: {msg}");
    }
}
