//! Rotary encoder decoder.
//!
//! Turns the encoder's clock / data / switch lines into navigation events
//! and keeps an absolute position that wraps modulo the device count.
//!
//! ## Decoding
//!
//! On every poll the clock line is sampled. When it differs from the
//! previous sample and is now low, the data line is read at that instant:
//!
//! | data | event  | position              |
//! |------|--------|-----------------------|
//! | low  | `Up`   | `(pos + N - 1) % N`   |
//! | high | `Down` | `(pos + 1) % N`       |
//!
//! The switch is active-low. A press wins over any rotation seen in the
//! same poll and opens a refractory window of [`BUTTON_REFRACTORY_MS`]
//! during which nothing is reported. The clock is still tracked inside the
//! window so the first poll after it does not replay a stale edge.

use embedded_hal::digital::InputPin;

use crate::config::BUTTON_REFRACTORY_MS;
use crate::error::Error;

/// Discrete input events produced by the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RotaryEvent {
    /// Previous element.
    Up,
    /// Next element.
    Down,
    /// Knob pushed.
    ButtonPressed,
}

/// Result of one poll: an optional event plus the absolute position.
///
/// `event == None` means "nothing this time, try again later".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub event: Option<RotaryEvent>,
    pub position: usize,
}

pub struct RotaryDecoder<CLK, DT, SW> {
    clock: CLK,
    data: DT,
    switch: SW,
    total: usize,
    position: usize,
    previous_clock: bool,
    inverted: bool,
    /// End of the current refractory window (ms), if one is open.
    quiet_until: Option<u64>,
}

impl<CLK, DT, SW> RotaryDecoder<CLK, DT, SW>
where
    CLK: InputPin,
    DT: InputPin,
    SW: InputPin,
{
    /// Arm the decoder for `total` devices.
    ///
    /// Fails with [`Error::InvalidDeviceCount`] when `total` is zero:
    /// there is nothing to bound the position against.
    pub fn new(clock: CLK, data: DT, switch: SW, total: usize) -> Result<Self, Error> {
        if total == 0 {
            error!("Rotary decoder armed with zero devices");
            return Err(Error::InvalidDeviceCount);
        }
        Ok(Self {
            clock,
            data,
            switch,
            total,
            position: 0,
            // Lines idle high (pull-ups).
            previous_clock: true,
            inverted: false,
            quiet_until: None,
        })
    }

    /// Swap `Up` and `Down` for an encoder mounted the other way round.
    pub fn with_inverted_direction(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Current absolute position, always in `[0, total)`.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Sample the lines once. `now_ms` is a monotonic timestamp.
    pub fn poll(&mut self, now_ms: u64) -> Result<Reading, Error> {
        let quiet = match self.quiet_until {
            Some(until) if now_ms < until => true,
            Some(_) => {
                self.quiet_until = None;
                false
            }
            None => false,
        };

        let clock = self.clock.is_high().map_err(|_| Error::Gpio)?;
        let mut turn = None;

        if clock != self.previous_clock {
            if !clock && !quiet {
                let data = self.data.is_high().map_err(|_| Error::Gpio)?;
                // data low => previous element
                let previous = !data ^ self.inverted;
                turn = Some(if previous { RotaryEvent::Up } else { RotaryEvent::Down });
            }
            self.previous_clock = clock;
        }

        if quiet {
            return Ok(Reading { event: None, position: self.position });
        }

        // A press swallows a turn from the same poll, position included.
        // The position only moves together with an Up / Down event.
        let event = if self.switch.is_low().map_err(|_| Error::Gpio)? {
            self.quiet_until = Some(now_ms.saturating_add(BUTTON_REFRACTORY_MS));
            Some(RotaryEvent::ButtonPressed)
        } else {
            match turn {
                Some(RotaryEvent::Up) => {
                    self.position = (self.position + self.total - 1) % self.total;
                }
                Some(_) => self.position = (self.position + 1) % self.total,
                None => {}
            }
            turn
        };

        if let Some(event) = event {
            debug!("Rotary: {} at {}", event, self.position);
        }

        Ok(Reading { event, position: self.position })
    }

    /// Infinite, poll-driven sequence of readings.
    ///
    /// `clock` supplies the timestamp for each poll.
    pub fn readings<C: FnMut() -> u64>(&mut self, clock: C) -> Readings<'_, CLK, DT, SW, C> {
        Readings { decoder: self, clock }
    }
}

/// Iterator returned by [`RotaryDecoder::readings`]. Never ends.
pub struct Readings<'a, CLK, DT, SW, C> {
    decoder: &'a mut RotaryDecoder<CLK, DT, SW>,
    clock: C,
}

impl<CLK, DT, SW, C> Iterator for Readings<'_, CLK, DT, SW, C>
where
    CLK: InputPin,
    DT: InputPin,
    SW: InputPin,
    C: FnMut() -> u64,
{
    type Item = Result<Reading, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let now = (self.clock)();
        Some(self.decoder.poll(now))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenPin, MockInput};

    struct Knob {
        clock: MockInput,
        data: MockInput,
        switch: MockInput,
    }

    fn knob(total: usize) -> (Knob, RotaryDecoder<MockInput, MockInput, MockInput>) {
        let knob = Knob {
            clock: MockInput::new(true),
            data: MockInput::new(true),
            switch: MockInput::new(true),
        };
        let decoder = RotaryDecoder::new(
            knob.clock.clone(),
            knob.data.clone(),
            knob.switch.clone(),
            total,
        )
        .unwrap();
        (knob, decoder)
    }

    /// One detent: clock falls with `data` on the data line, then rises.
    fn turn(
        knob: &Knob,
        decoder: &mut RotaryDecoder<MockInput, MockInput, MockInput>,
        data: bool,
        now: u64,
    ) -> Reading {
        knob.data.set(data);
        knob.clock.set(false);
        let reading = decoder.poll(now).unwrap();
        knob.clock.set(true);
        assert_eq!(decoder.poll(now).unwrap().event, None);
        reading
    }

    #[test]
    fn zero_devices_is_rejected() {
        let r = RotaryDecoder::new(
            MockInput::new(true),
            MockInput::new(true),
            MockInput::new(true),
            0,
        );
        assert!(matches!(r, Err(Error::InvalidDeviceCount)));
    }

    #[test]
    fn idle_lines_produce_no_event() {
        let (_knob, mut decoder) = knob(4);
        for t in 0..10 {
            assert_eq!(
                decoder.poll(t).unwrap(),
                Reading { event: None, position: 0 }
            );
        }
    }

    #[test]
    fn data_high_is_down_and_advances() {
        let (knob, mut decoder) = knob(4);
        let r = turn(&knob, &mut decoder, true, 0);
        assert_eq!(r, Reading { event: Some(RotaryEvent::Down), position: 1 });
    }

    #[test]
    fn data_low_is_up_and_wraps_below_zero() {
        let (knob, mut decoder) = knob(4);
        let r = turn(&knob, &mut decoder, false, 0);
        assert_eq!(r, Reading { event: Some(RotaryEvent::Up), position: 3 });
    }

    #[test]
    fn forward_wraps_to_zero() {
        let (knob, mut decoder) = knob(3);
        let positions: [usize; 4] = core::array::from_fn(|_| turn(&knob, &mut decoder, true, 0).position);
        assert_eq!(positions, [1, 2, 0, 1]);
    }

    #[test]
    fn rising_clock_edge_is_ignored() {
        let (knob, mut decoder) = knob(4);
        knob.clock.set(false);
        decoder.poll(0).unwrap();
        knob.clock.set(true);
        let r = decoder.poll(0).unwrap();
        assert_eq!(r.event, None);
        assert_eq!(r.position, 1);
    }

    #[test]
    fn button_wins_over_rotation() {
        let (knob, mut decoder) = knob(4);
        knob.switch.set(false);
        knob.clock.set(false);
        let r = decoder.poll(0).unwrap();
        assert_eq!(r, Reading { event: Some(RotaryEvent::ButtonPressed), position: 0 });

        // The swallowed detent is not replayed once the window is over.
        knob.switch.set(true);
        let r = decoder.poll(BUTTON_REFRACTORY_MS).unwrap();
        assert_eq!(r, Reading { event: None, position: 0 });
    }

    #[test]
    fn refractory_window_suppresses_everything() {
        let (knob, mut decoder) = knob(4);
        knob.switch.set(false);
        assert_eq!(decoder.poll(100).unwrap().event, Some(RotaryEvent::ButtonPressed));

        // Held button and a turn inside the window: nothing.
        knob.clock.set(false);
        let r = decoder.poll(100 + BUTTON_REFRACTORY_MS - 1).unwrap();
        assert_eq!(r, Reading { event: None, position: 0 });

        // Window over, clock level already seen, button still down.
        let r = decoder.poll(100 + BUTTON_REFRACTORY_MS).unwrap();
        assert_eq!(r.event, Some(RotaryEvent::ButtonPressed));
        assert_eq!(r.position, 0);
    }

    #[test]
    fn released_button_after_window_reports_rotation_again() {
        let (knob, mut decoder) = knob(4);
        knob.switch.set(false);
        decoder.poll(0).unwrap();
        knob.switch.set(true);
        let r = turn(&knob, &mut decoder, true, BUTTON_REFRACTORY_MS);
        assert_eq!(r, Reading { event: Some(RotaryEvent::Down), position: 1 });
    }

    #[test]
    fn inverted_direction_swaps_events() {
        let (knob, decoder) = knob(4);
        let mut decoder = decoder.with_inverted_direction(true);
        let r = turn(&knob, &mut decoder, true, 0);
        assert_eq!(r, Reading { event: Some(RotaryEvent::Up), position: 3 });
    }

    #[test]
    fn position_stays_bounded() {
        let (knob, mut decoder) = knob(5);
        let pattern = [true, true, false, true, false, false, false, true, true, true, true, true];
        for (i, data) in pattern.iter().cycle().take(200).enumerate() {
            let r = turn(&knob, &mut decoder, *data, i as u64);
            assert!(r.position < 5);
        }
    }

    #[test]
    fn readings_iterator_polls_with_supplied_clock() {
        let (knob, mut decoder) = knob(2);
        knob.clock.set(false);
        let mut t = 0;
        let first: heapless::Vec<Reading, 3> = decoder
            .readings(|| {
                t += 1;
                t
            })
            .take(3)
            .map(Result::unwrap)
            .collect();
        assert_eq!(first[0].event, Some(RotaryEvent::Down));
        assert_eq!(first[1].event, None);
        assert_eq!(first[2].event, None);
        assert_eq!(decoder.position(), 1);
    }

    #[test]
    fn pin_failure_is_a_gpio_error() {
        let mut decoder =
            RotaryDecoder::new(BrokenPin, MockInput::new(true), MockInput::new(true), 2).unwrap();
        assert_eq!(decoder.poll(0), Err(Error::Gpio));
    }
}
