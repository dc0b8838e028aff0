/// Timing baselines of one source.
///
/// `first_timestamp` and `first_wallclock` are written once and never reset
/// while the source stays open.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ReplayTimingState {
    pub first_timestamp: Option<f64>,
    pub first_wallclock: Option<f64>,
    /// Wallclock of the last extraction or suspension check.
    pub current_wallclock: f64,
}

/// Paces a stored trace against wallclock time.
///
/// A packet is releasable once the trace time elapsed since the first packet
/// no longer exceeds the wallclock time elapsed since the first release,
/// scaled by the replay speed.
///
/// # Examples
/// ```
/// use pktsrc_core::PseudoRealtimeClock;
///
/// let mut clock = PseudoRealtimeClock::new(1.0);
/// clock.observe_first_timestamp(100.0);
/// clock.observe_first_wallclock(5000.0);
/// assert_eq!(clock.release_time(100.5, 5000.4, 0.0), None);
/// assert_eq!(clock.release_time(100.5, 5000.5, 0.0), Some(0.5));
/// ```
#[derive(Debug, Clone)]
pub struct PseudoRealtimeClock {
    speed: f64,
    timing: ReplayTimingState,
}

impl PseudoRealtimeClock {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            timing: ReplayTimingState::default(),
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_active(&self) -> bool {
        self.speed > 0.0
    }

    pub fn timing(&self) -> &ReplayTimingState {
        &self.timing
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.timing.first_timestamp
    }

    /// Record the first packet's capture time; later calls are ignored.
    pub fn observe_first_timestamp(&mut self, ts: f64) -> bool {
        if self.timing.first_timestamp.is_some() {
            return false;
        }
        self.timing.first_timestamp = Some(ts);
        true
    }

    /// Record the wallclock of the first release; later calls are ignored.
    pub fn observe_first_wallclock(&mut self, now: f64) -> bool {
        if self.timing.first_wallclock.is_some() {
            return false;
        }
        self.timing.first_wallclock = Some(now);
        true
    }

    pub fn set_current_wallclock(&mut self, now: f64) {
        self.timing.current_wallclock = now;
    }

    pub fn current_wallclock(&self) -> f64 {
        self.timing.current_wallclock
    }

    /// Trace time elapsed since the first packet.
    pub fn pseudo_time(&self, ts: f64) -> f64 {
        ts - self.timing.first_timestamp.unwrap_or(ts)
    }

    /// Release timestamp for a packet at `ts`, or `None` while it must wait.
    ///
    /// Until the first release has fixed the wallclock baseline every packet is
    /// releasable, so startup delay does not count against the pacing.
    pub fn release_time(&self, ts: f64, now: f64, start_time: f64) -> Option<f64> {
        let pseudo_time = self.pseudo_time(ts);
        let releasable = match self.timing.first_wallclock {
            None => true,
            Some(first_wallclock) => pseudo_time <= (now - first_wallclock) * self.speed,
        };
        releasable.then_some(start_time + pseudo_time)
    }

    /// Release timestamp without pacing.
    pub fn pseudo_timestamp(&self, ts: f64, start_time: f64) -> f64 {
        start_time + self.pseudo_time(ts)
    }
}
