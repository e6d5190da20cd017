//! Bookkeeping for replacing the video sink of a live pipeline.
//!
//! A sink can only be unlinked safely when no buffer is in flight, so a swap on a
//! running pipeline is split in two: [`VideoSinkSwitcher::request`] records the
//! target and the caller blocks the upstream pad; once the block is reported,
//! [`VideoSinkSwitcher::finish`] hands out the sinks to relink.

/// What the caller has to do after [`VideoSinkSwitcher::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchRequest<S> {
    /// The target is already current or pending.
    Unchanged,
    /// The pipeline is not running: relink `previous` to the new current sink now.
    Immediate { previous: S },
    /// Block the upstream pad and call [`VideoSinkSwitcher::finish`] once blocked.
    Deferred,
    /// A swap was already waiting for the pad; only its target changed.
    Coalesced,
}

/// Outcome of [`VideoSinkSwitcher::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome<S> {
    /// No swap was pending.
    Idle,
    /// The pending target turned out to be the current sink.
    Aborted,
    /// Relink from `previous` to `next`, which is now current.
    Commit { previous: S, next: S },
}

#[derive(Debug, Clone)]
pub struct VideoSinkSwitcher<S> {
    current: S,
    pending: Option<S>,
}

impl<S: Clone + PartialEq> VideoSinkSwitcher<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            pending: None,
        }
    }

    pub fn current(&self) -> &S {
        &self.current
    }

    pub fn pending(&self) -> Option<&S> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn request(&mut self, target: S, running: bool) -> SwitchRequest<S> {
        let unchanged = match &self.pending {
            Some(pending) => *pending == target,
            None => self.current == target,
        };
        if unchanged {
            return SwitchRequest::Unchanged;
        }

        if !running {
            self.pending = None;
            let previous = std::mem::replace(&mut self.current, target);
            return SwitchRequest::Immediate { previous };
        }

        let coalesced = self.pending.replace(target).is_some();
        if coalesced {
            SwitchRequest::Coalesced
        } else {
            SwitchRequest::Deferred
        }
    }

    pub fn finish(&mut self) -> SwitchOutcome<S> {
        match self.pending.take() {
            None => SwitchOutcome::Idle,
            Some(next) if next == self.current => SwitchOutcome::Aborted,
            Some(next) => {
                let previous = std::mem::replace(&mut self.current, next.clone());
                SwitchOutcome::Commit { previous, next }
            }
        }
    }

    /// Forgets everything and starts over from `initial`.
    pub fn reset(&mut self, initial: S) {
        self.current = initial;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_pipeline_switches_immediately() {
        let mut switcher = VideoSinkSwitcher::new("null");
        assert_eq!(
            switcher.request("gl", false),
            SwitchRequest::Immediate { previous: "null" }
        );
        assert_eq!(*switcher.current(), "gl");
        assert_eq!(switcher.request("gl", false), SwitchRequest::Unchanged);
    }

    #[test]
    fn running_requests_coalesce_to_latest_target() {
        let mut switcher = VideoSinkSwitcher::new("null");
        assert_eq!(switcher.request("a", true), SwitchRequest::Deferred);
        assert_eq!(switcher.request("b", true), SwitchRequest::Coalesced);
        assert_eq!(switcher.request("c", true), SwitchRequest::Coalesced);
        assert_eq!(switcher.request("c", true), SwitchRequest::Unchanged);

        assert_eq!(
            switcher.finish(),
            SwitchOutcome::Commit {
                previous: "null",
                next: "c"
            }
        );
        assert!(!switcher.is_pending());
        assert_eq!(switcher.finish(), SwitchOutcome::Idle);
    }

    #[test]
    fn switching_back_before_block_aborts() {
        let mut switcher = VideoSinkSwitcher::new("null");
        assert_eq!(switcher.request("a", true), SwitchRequest::Deferred);
        assert_eq!(switcher.request("null", true), SwitchRequest::Coalesced);
        assert_eq!(switcher.finish(), SwitchOutcome::Aborted);
        assert_eq!(*switcher.current(), "null");
    }

    #[test]
    fn stopping_mid_swap_drops_pending_target() {
        let mut switcher = VideoSinkSwitcher::new("null");
        switcher.request("a", true);
        assert_eq!(
            switcher.request("b", false),
            SwitchRequest::Immediate { previous: "null" }
        );
        assert!(!switcher.is_pending());
        assert_eq!(*switcher.current(), "b");
    }
}
