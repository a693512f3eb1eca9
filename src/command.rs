//! Actuator command path
//!
//! A remote client writes a one-byte intensity; a periodic updater forwards
//! the latest value to the haptic actuator. The two sides share exactly one
//! [`IntensityCell`] and nothing else.
//!
//! The transport that delivers writes is not modelled here. Whatever
//! receives them translates each callback into a [`CommandEvent`] and hands
//! it to [`CommandBoundary::handle_event`].

use crate::controller::StopHandle;
use crate::Result;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Actuator refresh period
pub const ACTUATOR_PERIOD: Duration = Duration::from_millis(50);

/// Single-slot intensity value shared between threads
///
/// Stores and loads are single-byte atomics, so a reader never sees a torn
/// value. Writers and the periodic reader run concurrently with no ordering
/// between them beyond "last write wins by the time the next read occurs";
/// a read may return a value one write stale.
#[derive(Debug, Clone, Default)]
pub struct IntensityCell {
    value: Arc<AtomicU8>,
}

impl IntensityCell {
    /// Create a cell holding zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored intensity
    pub fn store(&self, intensity: u8) {
        self.value.store(intensity, Ordering::Relaxed);
    }

    /// Most recently stored intensity
    pub fn load(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Notifications from the command transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// A client connected
    Connected,
    /// The client went away
    Disconnected,
    /// The client wrote a value
    Write(Vec<u8>),
}

/// What the transport should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryAction {
    /// Nothing
    None,
    /// Make the device discoverable again
    RestartAdvertising,
}

/// Turns transport events into intensity updates
#[derive(Debug, Clone)]
pub struct CommandBoundary {
    cell: IntensityCell,
    connected: bool,
}

impl CommandBoundary {
    /// Create a boundary writing into `cell`
    pub fn new(cell: IntensityCell) -> Self {
        CommandBoundary {
            cell,
            connected: false,
        }
    }

    /// Whether a client is connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Apply one event
    ///
    /// A write stores its first byte; empty writes are ignored.
    pub fn handle_event(&mut self, event: CommandEvent) -> BoundaryAction {
        match event {
            CommandEvent::Connected => {
                log::info!("Client connected");
                self.connected = true;
                BoundaryAction::None
            }
            CommandEvent::Disconnected => {
                log::info!("Client disconnected; restarting advertising");
                self.connected = false;
                BoundaryAction::RestartAdvertising
            }
            CommandEvent::Write(bytes) => {
                if let Some(&intensity) = bytes.first() {
                    self.cell.store(intensity);
                    log::debug!("Received intensity: {}", intensity);
                }
                BoundaryAction::None
            }
        }
    }
}

/// Haptic driver accepting a real-time intensity
pub trait HapticActuator {
    /// Drive the actuator at `intensity`
    fn set_intensity(&mut self, intensity: u8) -> Result<()>;
}

impl<A: HapticActuator + ?Sized> HapticActuator for Box<A> {
    fn set_intensity(&mut self, intensity: u8) -> Result<()> {
        (**self).set_intensity(intensity)
    }
}

/// Periodically copies the intensity cell into the actuator
pub struct ActuatorUpdater<A: HapticActuator> {
    cell: IntensityCell,
    actuator: A,
    period: Duration,
}

impl<A: HapticActuator> ActuatorUpdater<A> {
    /// Create an updater with the default 50 ms period
    pub fn new(cell: IntensityCell, actuator: A) -> Self {
        Self::with_period(cell, actuator, ACTUATOR_PERIOD)
    }

    /// Create an updater with a custom period
    pub fn with_period(cell: IntensityCell, actuator: A, period: Duration) -> Self {
        ActuatorUpdater {
            cell,
            actuator,
            period,
        }
    }

    /// Refresh period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Forward the current intensity once
    pub fn tick(&mut self) -> Result<u8> {
        let intensity = self.cell.load();
        self.actuator.set_intensity(intensity)?;
        Ok(intensity)
    }

    /// Tick up to `ticks` times, one period apart, until `stop` is raised
    ///
    /// Returns the number of ticks performed.
    pub fn run_for(&mut self, ticks: usize, stop: &StopHandle) -> Result<usize> {
        let mut done = 0;
        while done < ticks && !stop.is_requested() {
            self.tick()?;
            done += 1;
            if done < ticks {
                std::thread::sleep(self.period);
            }
        }
        Ok(done)
    }

    /// The driven actuator
    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaybackError;

    #[derive(Default)]
    struct Recorder {
        values: Vec<u8>,
        fail: bool,
    }

    impl HapticActuator for Recorder {
        fn set_intensity(&mut self, intensity: u8) -> Result<()> {
            if self.fail {
                return Err(PlaybackError::Other("driver not found".into()));
            }
            self.values.push(intensity);
            Ok(())
        }
    }

    #[test]
    fn test_write_stores_first_byte() {
        let cell = IntensityCell::new();
        let mut boundary = CommandBoundary::new(cell.clone());

        boundary.handle_event(CommandEvent::Write(vec![200, 1, 2]));
        assert_eq!(cell.load(), 200);

        boundary.handle_event(CommandEvent::Write(Vec::new()));
        assert_eq!(cell.load(), 200);
    }

    #[test]
    fn test_connection_events() {
        let mut boundary = CommandBoundary::new(IntensityCell::new());
        assert_eq!(boundary.handle_event(CommandEvent::Connected), BoundaryAction::None);
        assert!(boundary.is_connected());
        assert_eq!(
            boundary.handle_event(CommandEvent::Disconnected),
            BoundaryAction::RestartAdvertising
        );
        assert!(!boundary.is_connected());
    }

    #[test]
    fn test_updater_forwards_latest() {
        let cell = IntensityCell::new();
        let mut updater = ActuatorUpdater::new(cell.clone(), Recorder::default());
        assert_eq!(updater.period(), Duration::from_millis(50));

        updater.tick().unwrap();
        cell.store(9);
        cell.store(42);
        updater.tick().unwrap();
        assert_eq!(updater.actuator().values, vec![0, 42]);
    }

    #[test]
    fn test_run_for_stops() {
        let cell = IntensityCell::new();
        cell.store(7);
        let mut updater =
            ActuatorUpdater::with_period(cell, Recorder::default(), Duration::from_millis(1));

        let stop = StopHandle::new();
        assert_eq!(updater.run_for(3, &stop).unwrap(), 3);
        stop.request();
        assert_eq!(updater.run_for(3, &stop).unwrap(), 0);
        assert_eq!(updater.actuator().values, vec![7, 7, 7]);
    }

    #[test]
    fn test_actuator_error_propagates() {
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut updater = ActuatorUpdater::new(IntensityCell::new(), recorder);
        assert!(updater.tick().is_err());
    }

    #[test]
    fn test_concurrent_writer() {
        let cell = IntensityCell::new();
        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for v in 0..=255u8 {
                    cell.store(v);
                }
            })
        };
        let mut updater =
            ActuatorUpdater::with_period(cell.clone(), Recorder::default(), Duration::ZERO);
        for _ in 0..100 {
            updater.tick().unwrap();
        }
        writer.join().unwrap();
        updater.tick().unwrap();
        assert_eq!(updater.actuator().values.last(), Some(&255));
    }
}
