//! Status LED module
//!
//! The firmware signals liveness through two LEDs: one pulsed per WiFi retry and per
//! received ESP-NOW frame, one pulsed after each TCP reply.

use std::time::Duration;

/// Half period of a pulse: on for this long, then off for this long
pub const PULSE_HALF_PERIOD: Duration = Duration::from_millis(500);

/// Something that can give a short visual signal
pub trait StatusIndicator {
    /// Blocking pulse, roughly one second
    fn pulse(&mut self);
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for &mut T {
    fn pulse(&mut self) {
        (**self).pulse()
    }
}

/// Indicator for builds without LEDs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn pulse(&mut self) {}
}

#[cfg(target_os = "espidf")]
pub use led::LedIndicator;

#[cfg(target_os = "espidf")]
mod led {
    use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
    use log::{info, warn};
    use std::thread;

    use super::{StatusIndicator, PULSE_HALF_PERIOD};
    use crate::error::Result;

    /// GPIO driven LED
    pub struct LedIndicator {
        pin: PinDriver<'static, AnyOutputPin, Output>,
        name: &'static str,
    }

    impl LedIndicator {
        /// Configure the pin as a push-pull output and drive it low
        pub fn new(pin: AnyOutputPin, name: &'static str) -> Result<Self> {
            let mut pin = PinDriver::output(pin)?;
            pin.set_low()?;
            info!("GPIO {} configured as OUTPUT for {} LED", pin.pin(), name);
            Ok(Self { pin, name })
        }
    }

    impl StatusIndicator for LedIndicator {
        fn pulse(&mut self) {
            if let Err(e) = self.pin.set_high() {
                warn!("Failed to switch {} LED on: {}", self.name, e);
            }
            thread::sleep(PULSE_HALF_PERIOD);
            if let Err(e) = self.pin.set_low() {
                warn!("Failed to switch {} LED off: {}", self.name, e);
            }
            thread::sleep(PULSE_HALF_PERIOD);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::StatusIndicator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts pulses without sleeping
    #[derive(Debug, Default, Clone)]
    pub struct CountingIndicator {
        pulses: Arc<AtomicUsize>,
    }

    impl CountingIndicator {
        pub fn pulses(&self) -> usize {
            self.pulses.load(Ordering::SeqCst)
        }
    }

    impl StatusIndicator for CountingIndicator {
        fn pulse(&mut self) {
            self.pulses.fetch_add(1, Ordering::SeqCst);
        }
    }
}
