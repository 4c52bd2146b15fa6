//! Sound loop: D-pad clips with a single active clip, plus the horn

use crate::config::{SoundBinding, SoundConfig};
use crate::control::control_loop::{ControlLoop, LoopKind, TickOutcome};
use crate::control::error::LoopError;
use crate::controller::{Channel, EventCache};
use crate::output::{SoundCommand, SoundPlayer};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Plays at most one clip at a time
///
/// Selecting the playing clip again stops it. Selecting another clip stops
/// the current one first. The horn beeps on top of whatever is playing.
pub struct SoundLoop {
    cache: Arc<EventCache>,
    player: Box<dyn SoundPlayer>,
    bindings: Vec<SoundBinding>,
    channels: Vec<Channel>,
    horn: Option<Channel>,
    playing: Option<String>,
}

impl SoundLoop {
    pub fn new(cache: Arc<EventCache>, player: Box<dyn SoundPlayer>, config: SoundConfig) -> Self {
        let mut channels: Vec<Channel> = Vec::new();
        for binding in &config.bindings {
            if !channels.contains(&binding.channel) {
                channels.push(binding.channel);
            }
        }

        Self {
            cache,
            player,
            bindings: config.bindings,
            channels,
            horn: config.horn,
            playing: None,
        }
    }

    /// Clip currently started and not yet stopped
    pub fn playing(&self) -> Option<&str> {
        self.playing.as_deref()
    }

    // `playing` only changes once the player accepted the command
    fn select(&mut self, clip: String) -> Result<(), LoopError> {
        match self.playing.as_deref() {
            Some(current) if current == clip => {
                info!("Stopping {}", current);
                self.player.sound(SoundCommand::Stop(clip))?;
                self.playing = None;
            }
            Some(current) => {
                info!("Switching {} -> {}", current, clip);
                self.player.sound(SoundCommand::Stop(current.to_string()))?;
                self.playing = None;
                self.player.sound(SoundCommand::Start(clip.clone()))?;
                self.playing = Some(clip);
            }
            None => {
                info!("Starting {}", clip);
                self.player.sound(SoundCommand::Start(clip.clone()))?;
                self.playing = Some(clip);
            }
        }
        Ok(())
    }

    fn clip_for(&self, channel: Channel, value: i32) -> Option<String> {
        self.bindings
            .iter()
            .find(|b| b.channel == channel && b.value == value)
            .map(|b| b.clip.clone())
    }
}

impl ControlLoop for SoundLoop {
    fn kind(&self) -> LoopKind {
        LoopKind::Sound
    }

    /// Every consumed request is handled even if an earlier one fails; the
    /// first failure is returned at the end of the tick
    fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        let mut outcome = TickOutcome::Skipped;
        let mut first_error: Option<LoopError> = None;

        if let Some(horn) = self.horn {
            if let Some(event) = self.cache.consume(horn) {
                if event.is_press() {
                    match self.player.sound(SoundCommand::Beep) {
                        Ok(()) => outcome = TickOutcome::Issued,
                        Err(e) => first_error = Some(e.into()),
                    }
                }
            }
        }

        let requested: Vec<String> = self
            .channels
            .iter()
            .filter_map(|&channel| {
                let event = self.cache.consume(channel)?;
                let clip = self.clip_for(channel, event.value);
                if clip.is_none() {
                    debug!("No clip bound to {} = {}", channel, event.value);
                }
                clip
            })
            .collect();

        for clip in requested {
            match self.select(clip) {
                Ok(()) => outcome = TickOutcome::Issued,
                Err(e) => {
                    warn!("Sound request failed: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ChannelEvent;
    use crate::output::{CommandLog, OutputError};

    // Records like CommandLog but refuses the first `stops` Stop commands
    struct StubbornPlayer {
        log: CommandLog,
        stops: usize,
    }

    impl SoundPlayer for StubbornPlayer {
        fn sound(&mut self, command: SoundCommand) -> Result<(), OutputError> {
            if matches!(command, SoundCommand::Stop(_)) && self.stops > 0 {
                self.stops -= 1;
                return Err(OutputError::Rejected("speaker busy".into()));
            }
            self.log.sound(command)
        }
    }

    fn stubborn_loop(stops: usize) -> (SoundLoop, Arc<EventCache>, CommandLog) {
        let cache = Arc::new(EventCache::new());
        let log = CommandLog::new();
        let player = StubbornPlayer {
            log: log.clone(),
            stops,
        };
        let sound = SoundLoop::new(Arc::clone(&cache), Box::new(player), SoundConfig::default());
        (sound, cache, log)
    }

    fn push(cache: &EventCache, channel: Channel, value: i32) {
        cache.write(channel, ChannelEvent::from_timeval(3, 0, channel, value));
    }

    fn sound_loop() -> (SoundLoop, Arc<EventCache>, CommandLog) {
        let cache = Arc::new(EventCache::new());
        let log = CommandLog::new();
        let sound = SoundLoop::new(
            Arc::clone(&cache),
            Box::new(log.clone()),
            SoundConfig::default(),
        );
        (sound, cache, log)
    }

    fn start(clip: &str) -> SoundCommand {
        SoundCommand::Start(clip.to_string())
    }

    fn stop(clip: &str) -> SoundCommand {
        SoundCommand::Stop(clip.to_string())
    }

    #[test]
    fn nothing_to_do_without_input() {
        let (mut sound, _, log) = sound_loop();
        assert_eq!(sound.tick().unwrap(), TickOutcome::Skipped);
        assert!(log.is_empty());
    }

    #[test]
    fn same_clip_twice_toggles_it_off() {
        let (mut sound, cache, log) = sound_loop();

        push(&cache, Channel::AxisDPadY, -1);
        assert_eq!(sound.tick().unwrap(), TickOutcome::Issued);
        assert_eq!(sound.playing(), Some("sounds/siren.wav"));

        // D-pad release (0) is consumed without effect
        push(&cache, Channel::AxisDPadY, 0);
        assert_eq!(sound.tick().unwrap(), TickOutcome::Skipped);

        push(&cache, Channel::AxisDPadY, -1);
        sound.tick().unwrap();
        assert_eq!(sound.playing(), None);

        assert_eq!(
            log.sound_commands(),
            vec![start("sounds/siren.wav"), stop("sounds/siren.wav")]
        );
    }

    #[test]
    fn other_clip_replaces_current() {
        let (mut sound, cache, log) = sound_loop();

        push(&cache, Channel::AxisDPadY, 1);
        sound.tick().unwrap();
        push(&cache, Channel::AxisDPadX, -1);
        sound.tick().unwrap();

        assert_eq!(sound.playing(), Some("sounds/fanfare.wav"));
        assert_eq!(
            log.sound_commands(),
            vec![
                start("sounds/engine.wav"),
                stop("sounds/engine.wav"),
                start("sounds/fanfare.wav"),
            ]
        );
    }

    #[test]
    fn held_direction_fires_once() {
        let (mut sound, cache, log) = sound_loop();

        push(&cache, Channel::AxisDPadX, 1);
        for _ in 0..5 {
            sound.tick().unwrap();
        }
        assert_eq!(log.sound_commands(), vec![start("sounds/alarm.wav")]);
    }

    #[test]
    fn horn_beeps_without_touching_active_clip() {
        let (mut sound, cache, log) = sound_loop();

        push(&cache, Channel::AxisDPadY, 1);
        sound.tick().unwrap();
        push(&cache, Channel::ButtonCircle, 1);
        sound.tick().unwrap();
        push(&cache, Channel::ButtonCircle, 0);
        sound.tick().unwrap();

        assert_eq!(sound.playing(), Some("sounds/engine.wav"));
        assert_eq!(
            log.sound_commands(),
            vec![start("sounds/engine.wav"), SoundCommand::Beep]
        );
    }

    #[test]
    fn no_horn_configured() {
        let cache = Arc::new(EventCache::new());
        let log = CommandLog::new();
        let config = SoundConfig {
            horn: None,
            ..SoundConfig::default()
        };
        let mut sound = SoundLoop::new(Arc::clone(&cache), Box::new(log.clone()), config);

        push(&cache, Channel::ButtonCircle, 1);
        assert_eq!(sound.tick().unwrap(), TickOutcome::Skipped);
        assert!(log.is_empty());
        assert!(cache.peek(Channel::ButtonCircle).is_some());
    }

    #[test]
    fn rejected_stop_keeps_current_clip() {
        let (mut sound, cache, log) = stubborn_loop(1);

        push(&cache, Channel::AxisDPadY, -1);
        sound.tick().unwrap();

        // Switching fails: siren is still the clip that plays
        push(&cache, Channel::AxisDPadX, 1);
        assert!(matches!(sound.tick(), Err(LoopError::Output(_))));
        assert_eq!(sound.playing(), Some("sounds/siren.wav"));

        // Next selection stops siren before starting anything else
        push(&cache, Channel::AxisDPadY, 1);
        assert_eq!(sound.tick().unwrap(), TickOutcome::Issued);
        assert_eq!(sound.playing(), Some("sounds/engine.wav"));
        assert_eq!(
            log.sound_commands(),
            vec![
                start("sounds/siren.wav"),
                stop("sounds/siren.wav"),
                start("sounds/engine.wav"),
            ]
        );
    }

    #[test]
    fn failed_request_does_not_drop_the_rest_of_the_tick() {
        let (mut sound, cache, log) = stubborn_loop(1);

        push(&cache, Channel::AxisDPadY, -1);
        sound.tick().unwrap();

        // Engine (D-pad Y) is handled first and fails, alarm (D-pad X) still goes through
        push(&cache, Channel::AxisDPadY, 1);
        push(&cache, Channel::AxisDPadX, 1);
        push(&cache, Channel::ButtonCircle, 1);
        assert!(sound.tick().is_err());

        assert_eq!(sound.playing(), Some("sounds/alarm.wav"));
        assert_eq!(
            log.sound_commands(),
            vec![
                start("sounds/siren.wav"),
                SoundCommand::Beep,
                stop("sounds/siren.wav"),
                start("sounds/alarm.wav"),
            ]
        );
        assert!(cache.peek(Channel::AxisDPadY).is_none());
        assert!(cache.peek(Channel::AxisDPadX).is_none());
    }
}
