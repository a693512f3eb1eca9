use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use flashplay::command::BoundaryAction;
use flashplay::{
    ActuatorUpdater, CommandBoundary, CommandEvent, HapticActuator, IntensityCell, Result,
    StopHandle,
};

#[derive(Clone, Default)]
struct SharedActuator {
    values: Arc<Mutex<Vec<u8>>>,
}

impl HapticActuator for SharedActuator {
    fn set_intensity(&mut self, intensity: u8) -> Result<()> {
        self.values.lock().unwrap().push(intensity);
        Ok(())
    }
}

#[test]
fn test_transport_writes_reach_actuator() {
    let cell = IntensityCell::new();
    let mut boundary = CommandBoundary::new(cell.clone());
    let actuator = SharedActuator::default();
    let mut updater =
        ActuatorUpdater::with_period(cell, actuator.clone(), Duration::from_millis(1));

    assert_eq!(boundary.handle_event(CommandEvent::Connected), BoundaryAction::None);
    boundary.handle_event(CommandEvent::Write(vec![180]));
    updater.tick().unwrap();
    boundary.handle_event(CommandEvent::Write(vec![]));
    updater.tick().unwrap();
    assert_eq!(
        boundary.handle_event(CommandEvent::Disconnected),
        BoundaryAction::RestartAdvertising
    );

    assert_eq!(*actuator.values.lock().unwrap(), vec![180, 180]);
}

#[test]
fn test_updater_runs_beside_writer_thread() {
    let cell = IntensityCell::new();
    let stop = StopHandle::new();
    let actuator = SharedActuator::default();

    let updater_thread = {
        let cell = cell.clone();
        let stop = stop.clone();
        let actuator = actuator.clone();
        thread::spawn(move || {
            let period = Duration::from_millis(1);
            let mut updater = ActuatorUpdater::with_period(cell, actuator, period);
            updater.run_for(usize::MAX, &stop)
        })
    };

    let mut boundary = CommandBoundary::new(cell.clone());
    for v in 1..=50u8 {
        boundary.handle_event(CommandEvent::Write(vec![v]));
        thread::sleep(Duration::from_micros(200));
    }
    thread::sleep(Duration::from_millis(10));
    stop.request();

    let ticks = updater_thread.join().unwrap().unwrap();
    let values = actuator.values.lock().unwrap();
    assert_eq!(values.len(), ticks);
    assert!(values.iter().all(|&v| v <= 50));
    assert_eq!(values.last(), Some(&50));
}
