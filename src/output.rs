//! Commands sent to the rover hardware and the sinks that receive them
//!
//! Motor, LED and speaker drivers live outside this crate. Loops talk to them
//! through the four sink traits below. Two implementations ship here:
//! [`TracingSink`] logs every command, [`CommandLog`] records them in memory.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Combined steering and speed, both in `[-100, 100]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub steering: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccessoryCommand {
    Run(f64),
    Off,
}

/// Named LED colors available on the brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Black,
    Red,
    Green,
    Amber,
    Orange,
    Yellow,
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedColor::Black => "BLACK",
            LedColor::Red => "RED",
            LedColor::Green => "GREEN",
            LedColor::Amber => "AMBER",
            LedColor::Orange => "ORANGE",
            LedColor::Yellow => "YELLOW",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCommand {
    Set { left: LedColor, right: LedColor },
    AllOff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundCommand {
    Start(String),
    Stop(String),
    Beep,
}

/// Any command, as recorded by [`CommandLog`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Drive(DriveCommand),
    Accessory(AccessoryCommand),
    Indicator(IndicatorCommand),
    Sound(SoundCommand),
}

// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Actuator rejected command: {0}")]
    Rejected(String),
}

pub trait DriveActuator: Send + 'static {
    fn drive(&mut self, command: DriveCommand) -> Result<(), OutputError>;
}

pub trait AccessoryActuator: Send + 'static {
    fn accessory(&mut self, command: AccessoryCommand) -> Result<(), OutputError>;
}

pub trait Indicator: Send + 'static {
    fn indicate(&mut self, command: IndicatorCommand) -> Result<(), OutputError>;
}

pub trait SoundPlayer: Send + 'static {
    fn sound(&mut self, command: SoundCommand) -> Result<(), OutputError>;
}

/// Logs each command; stands in for hardware drivers
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl DriveActuator for TracingSink {
    fn drive(&mut self, command: DriveCommand) -> Result<(), OutputError> {
        info!(
            "Drive: steering {:.2}, speed {:.2}",
            command.steering, command.speed
        );
        Ok(())
    }
}

impl AccessoryActuator for TracingSink {
    fn accessory(&mut self, command: AccessoryCommand) -> Result<(), OutputError> {
        match command {
            AccessoryCommand::Run(speed) => info!("Accessory: run at {:.2}", speed),
            AccessoryCommand::Off => info!("Accessory: off"),
        }
        Ok(())
    }
}

impl Indicator for TracingSink {
    fn indicate(&mut self, command: IndicatorCommand) -> Result<(), OutputError> {
        match command {
            IndicatorCommand::Set { left, right } => info!("LEDs: LEFT {} RIGHT {}", left, right),
            IndicatorCommand::AllOff => info!("LEDs: all off"),
        }
        Ok(())
    }
}

impl SoundPlayer for TracingSink {
    fn sound(&mut self, command: SoundCommand) -> Result<(), OutputError> {
        match command {
            SoundCommand::Start(clip) => info!("Playing {}", clip),
            SoundCommand::Stop(clip) => info!("Stopping {}", clip),
            SoundCommand::Beep => info!("Beep"),
        }
        Ok(())
    }
}

/// Shared in-memory record of issued commands
///
/// Clones share the same log, so one clone can be handed to a loop while
/// another is inspected.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    pub fn drive_commands(&self) -> Vec<DriveCommand> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                Command::Drive(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn sound_commands(&self) -> Vec<SoundCommand> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                Command::Sound(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, command: Command) {
        self.commands.lock().push(command);
    }
}

impl DriveActuator for CommandLog {
    fn drive(&mut self, command: DriveCommand) -> Result<(), OutputError> {
        self.push(Command::Drive(command));
        Ok(())
    }
}

impl AccessoryActuator for CommandLog {
    fn accessory(&mut self, command: AccessoryCommand) -> Result<(), OutputError> {
        self.push(Command::Accessory(command));
        Ok(())
    }
}

impl Indicator for CommandLog {
    fn indicate(&mut self, command: IndicatorCommand) -> Result<(), OutputError> {
        self.push(Command::Indicator(command));
        Ok(())
    }
}

impl SoundPlayer for CommandLog {
    fn sound(&mut self, command: SoundCommand) -> Result<(), OutputError> {
        self.push(Command::Sound(command));
        Ok(())
    }
}
