//! Accessory motor on the right stick, with a full-speed override button

use crate::config::AccessoryConfig;
use crate::control::control_loop::{ControlLoop, LoopKind, TickOutcome};
use crate::control::error::LoopError;
use crate::control::shaping::{apply_deadzone, stick_to_percent};
use crate::controller::EventCache;
use crate::output::{AccessoryActuator, AccessoryCommand};
use std::sync::Arc;

pub struct AccessoryLoop {
    cache: Arc<EventCache>,
    actuator: Box<dyn AccessoryActuator>,
    config: AccessoryConfig,
}

impl AccessoryLoop {
    pub fn new(
        cache: Arc<EventCache>,
        actuator: Box<dyn AccessoryActuator>,
        config: AccessoryConfig,
    ) -> Self {
        Self {
            cache,
            actuator,
            config,
        }
    }

    pub fn compute(&self) -> Option<AccessoryCommand> {
        let held = self
            .cache
            .peek(self.config.override_button)
            .map(|event| event.is_press())
            .unwrap_or(false);
        if held {
            return Some(AccessoryCommand::Run(self.config.override_speed));
        }

        let axis = self.cache.peek(self.config.axis)?;
        let mut speed = stick_to_percent(axis.value);
        if self.config.invert_axis {
            speed = -speed;
        }
        let speed = apply_deadzone(speed, self.config.deadzone);

        if speed == 0.0 {
            Some(AccessoryCommand::Off)
        } else {
            Some(AccessoryCommand::Run(speed))
        }
    }
}

impl ControlLoop for AccessoryLoop {
    fn kind(&self) -> LoopKind {
        LoopKind::Accessory
    }

    fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        match self.compute() {
            Some(command) => {
                self.actuator.accessory(command)?;
                Ok(TickOutcome::Issued)
            }
            None => Ok(TickOutcome::Skipped),
        }
    }
}
