use tracing::warn;

use crate::common::{FrameId, DEFAULT_LRUK_K};

use super::{ClockReplacer, LruKReplacer};

/// Replacement policy over the set of unpinned frames.
///
/// - `pin` removes a frame from the victim candidate set;
/// - `unpin` adds it back;
/// - `victim` selects and removes one candidate;
/// - `len` reports the candidate count.
pub trait Replacer: Send {
    fn pin(&mut self, fid: FrameId);
    fn unpin(&mut self, fid: FrameId);
    fn victim(&mut self) -> Option<FrameId>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a replacer from its configuration token.
///
/// Recognized forms: `"clock"` (default) and `"lruk"` / `"lruk:k=N"` with a
/// floor of 2 on `N`. Anything else falls back to clock with a warning.
pub fn build_replacer(token: &str, capacity: usize) -> Box<dyn Replacer> {
    let token = token.trim();
    if token == "clock" {
        return Box::new(ClockReplacer::new(capacity));
    }
    if token == "lruk" {
        return Box::new(LruKReplacer::new(capacity, DEFAULT_LRUK_K));
    }
    if let Some(rest) = token.strip_prefix("lruk:k=") {
        let k = rest.parse::<usize>().unwrap_or(DEFAULT_LRUK_K).max(2);
        return Box::new(LruKReplacer::new(capacity, k));
    }
    warn!(replacer = token, "unknown replacer, falling back to clock");
    Box::new(ClockReplacer::new(capacity))
}
