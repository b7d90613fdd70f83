use std::time::Duration;

/// Timing and event counters for a single [`World::step`](crate::World::step).
///
/// Returned by value from `step` rather than accumulated in shared state, so
/// callers can aggregate, log, or drop it as they see fit.
#[derive(Debug, Default, Clone, Copy)]
pub struct Profile {
    pub broad_phase_time: Duration,
    pub collide_time: Duration,
    pub solve_time: Duration,
    pub solve_toi_time: Duration,
    pub total_time: Duration,

    pub body_count: usize,
    pub contact_count: usize,
    pub island_count: usize,

    /// Pairs considered by the continuous-collision pass.
    pub toi_candidates: usize,
    /// Root finds or sub-step budgets that hit their iteration cap. Each one
    /// is a pair whose impact was deferred to the next step instead of being
    /// resolved in this one.
    pub toi_overflows: usize,
}

impl Profile {
    /// Logs a breakdown at debug level. No-op when the step was too fast to
    /// measure.
    pub fn report(&self) {
        let total_us = self.total_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::debug!("--- Step Profile ---");
        log::debug!(
            "Bodies: {}, Contacts: {}, Islands: {}",
            self.body_count,
            self.contact_count,
            self.island_count
        );
        log::debug!("Total: {:.2} ms", self.total_time.as_secs_f32() * 1000.0);
        log::debug!(
            "  Broad Phase: {:.2} ms ({:.1}%)",
            self.broad_phase_time.as_secs_f32() * 1000.0,
            (self.broad_phase_time.as_micros() as f32 / total_us) * 100.0
        );
        log::debug!(
            "  Collide:     {:.2} ms ({:.1}%)",
            self.collide_time.as_secs_f32() * 1000.0,
            (self.collide_time.as_micros() as f32 / total_us) * 100.0
        );
        log::debug!(
            "  Solve:       {:.2} ms ({:.1}%)",
            self.solve_time.as_secs_f32() * 1000.0,
            (self.solve_time.as_micros() as f32 / total_us) * 100.0
        );
        log::debug!(
            "  Solve TOI:   {:.2} ms ({:.1}%)",
            self.solve_toi_time.as_secs_f32() * 1000.0,
            (self.solve_toi_time.as_micros() as f32 / total_us) * 100.0
        );
        if self.toi_overflows > 0 {
            log::debug!(
                "  TOI overflows: {} of {} candidates",
                self.toi_overflows,
                self.toi_candidates
            );
        }
    }
}
