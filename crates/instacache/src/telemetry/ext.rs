// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;

/// The output of a future together with how long it took on the cache clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timed<R> {
    pub result: R,
    pub duration: Duration,
}

pub(crate) trait ClockExt {
    /// Awaits `operation`, measuring it against this clock.
    fn timed<F>(&self, operation: F) -> impl Future<Output = Timed<F::Output>> + Send
    where
        F: Future + Send;
}

impl ClockExt for Clock {
    async fn timed<F>(&self, operation: F) -> Timed<F::Output>
    where
        F: Future + Send,
    {
        let started = self.instant();
        let result = operation.await;
        let duration = self.instant().saturating_duration_since(started);
        Timed { result, duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_advanced_time() {
        let control = tick::ClockControl::new();
        let clock = control.to_clock();

        let timed = futures::executor::block_on(clock.timed(async {
            control.advance(Duration::from_millis(100));
            42
        }));

        assert_eq!(timed.result, 42);
        assert_eq!(timed.duration, Duration::from_millis(100));
    }

    #[test]
    fn frozen_clock_measures_nothing() {
        let timed = futures::executor::block_on(Clock::new_frozen().timed(async { "done" }));
        assert_eq!(timed.result, "done");
        assert_eq!(timed.duration, Duration::ZERO);
    }
}
