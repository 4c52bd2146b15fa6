//! Drive loop: sticks and triggers to a combined steering/speed command

use crate::config::DriveConfig;
use crate::control::control_loop::{ControlLoop, LoopKind, TickOutcome};
use crate::control::error::LoopError;
use crate::control::mode::{Mode, ModeState};
use crate::control::shaping::{apply_deadzone, shape, stick_to_percent, triggers_to_speed};
use crate::controller::EventCache;
use crate::output::{DriveActuator, DriveCommand};
use std::sync::Arc;
use tracing::trace;

pub struct DriveLoop {
    cache: Arc<EventCache>,
    mode: Arc<ModeState>,
    actuator: Box<dyn DriveActuator>,
    config: DriveConfig,
}

impl DriveLoop {
    pub fn new(
        cache: Arc<EventCache>,
        mode: Arc<ModeState>,
        actuator: Box<dyn DriveActuator>,
        config: DriveConfig,
    ) -> Self {
        Self {
            cache,
            mode,
            actuator,
            config,
        }
    }

    /// Command for the current input, `None` while any needed axis is absent
    pub fn compute(&self, mode: Mode) -> Option<DriveCommand> {
        let (steering, speed) = match mode {
            Mode::Stick => {
                let steer = self.cache.peek(self.config.stick_steering_axis)?;
                let throttle = self.cache.peek(self.config.stick_throttle_axis)?;
                // Stick Y grows towards the driver
                (stick_to_percent(steer.value), -stick_to_percent(throttle.value))
            }
            Mode::Default | Mode::Maneuver => {
                let steer = self.cache.peek(self.config.steering_axis)?;
                let forward = self.cache.peek(self.config.forward_trigger)?;
                let reverse = self.cache.peek(self.config.reverse_trigger)?;
                (
                    stick_to_percent(steer.value),
                    triggers_to_speed(forward.value, reverse.value, self.config.trigger_max),
                )
            }
        };

        let mut steering = apply_deadzone(steering, self.config.deadzone);
        let speed = apply_deadzone(speed, self.config.deadzone);
        if mode == Mode::Maneuver {
            steering = shape(steering, self.config.shaping_weight);
        }

        Some(DriveCommand { steering, speed })
    }
}

impl ControlLoop for DriveLoop {
    fn kind(&self) -> LoopKind {
        LoopKind::Drive
    }

    fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        let Some(command) = self.compute(self.mode.current()) else {
            trace!("Drive input incomplete, skipping tick");
            return Ok(TickOutcome::Skipped);
        };

        self.actuator.drive(command)?;
        Ok(TickOutcome::Issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::mode::ModeToggle;
    use crate::controller::{Channel, ChannelEvent};
    use crate::output::CommandLog;

    fn set(cache: &EventCache, channel: Channel, value: i32) {
        cache.write(channel, ChannelEvent::from_timeval(1, 0, channel, value));
    }

    fn drive_loop() -> (DriveLoop, Arc<EventCache>, Arc<ModeState>, CommandLog) {
        let cache = Arc::new(EventCache::new());
        let mode = Arc::new(ModeState::new());
        let log = CommandLog::new();
        let drive = DriveLoop::new(
            Arc::clone(&cache),
            Arc::clone(&mode),
            Box::new(log.clone()),
            DriveConfig::default(),
        );
        (drive, cache, mode, log)
    }

    #[test]
    fn skips_until_every_axis_has_reported() {
        let (mut drive, cache, _, log) = drive_loop();

        assert_eq!(drive.tick().unwrap(), TickOutcome::Skipped);
        set(&cache, Channel::AxisLeftStickX, 128);
        set(&cache, Channel::AxisR2, 255);
        assert_eq!(drive.tick().unwrap(), TickOutcome::Skipped);
        assert!(log.is_empty());

        set(&cache, Channel::AxisL2, 0);
        assert_eq!(drive.tick().unwrap(), TickOutcome::Issued);
        assert_eq!(
            log.drive_commands(),
            vec![DriveCommand {
                steering: 0.0,
                speed: 100.0
            }]
        );
    }

    #[test]
    fn centered_stick_and_equal_triggers_stand_still() {
        let (mut drive, cache, _, log) = drive_loop();
        set(&cache, Channel::AxisLeftStickX, 128);
        set(&cache, Channel::AxisR2, 90);
        set(&cache, Channel::AxisL2, 90);

        drive.tick().unwrap();
        assert_eq!(
            log.drive_commands(),
            vec![DriveCommand {
                steering: 0.0,
                speed: 0.0
            }]
        );
    }

    #[test]
    fn reverse_on_left_trigger() {
        let (drive, cache, _, _) = drive_loop();
        set(&cache, Channel::AxisLeftStickX, 0);
        set(&cache, Channel::AxisR2, 0);
        set(&cache, Channel::AxisL2, 255);

        let command = drive.compute(Mode::Default).unwrap();
        assert_eq!(command.steering, -100.0);
        assert!((command.speed + 100.0).abs() < 1e-9);
    }

    #[test]
    fn maneuver_mode_softens_steering() {
        let (drive, cache, mode, _) = drive_loop();
        set(&cache, Channel::AxisLeftStickX, 160); // ~24.8 right
        set(&cache, Channel::AxisR2, 0);
        set(&cache, Channel::AxisL2, 0);

        let plain = drive.compute(Mode::Default).unwrap();
        mode.toggle(ModeToggle::Maneuver);
        let shaped = drive.compute(mode.current()).unwrap();

        assert!(plain.steering > 0.0);
        assert!(shaped.steering > 0.0);
        assert!(shaped.steering < plain.steering);
    }

    #[test]
    fn stick_mode_reads_both_sticks() {
        let (mut drive, cache, mode, log) = drive_loop();
        mode.toggle(ModeToggle::Stick);

        // Trigger axes alone are not enough in stick mode
        set(&cache, Channel::AxisR2, 255);
        set(&cache, Channel::AxisL2, 0);
        set(&cache, Channel::AxisLeftStickX, 128);
        assert_eq!(drive.tick().unwrap(), TickOutcome::Skipped);

        set(&cache, Channel::AxisRightStickX, 128);
        set(&cache, Channel::AxisLeftStickY, 0); // pushed fully away
        assert_eq!(drive.tick().unwrap(), TickOutcome::Issued);

        let command = log.drive_commands()[0];
        assert_eq!(command.steering, 0.0);
        assert_eq!(command.speed, 100.0);
    }

    #[test]
    fn peeking_leaves_axes_in_cache() {
        let (mut drive, cache, _, log) = drive_loop();
        set(&cache, Channel::AxisLeftStickX, 200);
        set(&cache, Channel::AxisR2, 100);
        set(&cache, Channel::AxisL2, 0);

        for _ in 0..3 {
            drive.tick().unwrap();
        }
        assert_eq!(log.drive_commands().len(), 3);
        assert!(cache.peek(Channel::AxisR2).is_some());
    }
}
