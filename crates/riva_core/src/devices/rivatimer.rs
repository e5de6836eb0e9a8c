/*
    RivaPC
    https://github.com/dbalsom/rivapc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    devices::rivatimer.rs

    Implements the periodic virtual timer behind the GPU's two frequency
    synthesizers. The emulated chip ticks in the tens of megahertz; the host
    machine loop does not, so the timer counts whole periods out of the
    elapsed time the host feeds it and carries the remainder.

*/

/// A periodic virtual timer. Created lazily by the clock generator that
/// needs it; reprogrammed in place on every divider write rather than
/// recreated.
pub struct RivaTimer {
    period_us: f64,
    elapsed_us: f64,
    running: bool,
}

impl RivaTimer {
    pub fn new(period_us: f64) -> Self {
        Self {
            period_us,
            elapsed_us: 0.0,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.elapsed_us = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn period_us(&self) -> f64 {
        self.period_us
    }

    /// Update the period in place. Accumulated fractional time is kept, so a
    /// reprogrammed timer does not lose a partial period already elapsed.
    pub fn set_period(&mut self, period_us: f64) {
        self.period_us = period_us;
    }

    /// Advance the timer by `us` microseconds of host time, returning the
    /// number of whole periods that elapsed.
    pub fn advance(&mut self, us: f64) -> u32 {
        if !self.running || self.period_us <= 0.0 {
            return 0;
        }

        self.elapsed_us += us;
        let ticks = (self.elapsed_us / self.period_us) as u32;
        self.elapsed_us -= f64::from(ticks) * self.period_us;
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_does_not_tick_until_started() {
        let mut timer = RivaTimer::new(10.0);
        assert_eq!(timer.advance(100.0), 0);

        timer.start();
        assert_eq!(timer.advance(100.0), 10);
    }

    #[test]
    fn timer_carries_remainder_across_calls() {
        let mut timer = RivaTimer::new(10.0);
        timer.start();

        assert_eq!(timer.advance(15.0), 1);
        // 5us left over; 5 more completes the second period.
        assert_eq!(timer.advance(5.0), 1);
    }

    #[test]
    fn set_period_keeps_timer_running() {
        let mut timer = RivaTimer::new(10.0);
        timer.start();
        timer.advance(10.0);

        timer.set_period(20.0);
        assert!(timer.is_running());
        assert_eq!(timer.advance(40.0), 2);
    }
}
