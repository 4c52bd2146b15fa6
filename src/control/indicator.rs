//! Mode toggles and the LEDs that show the current mode

use crate::config::{IndicatorConfig, IndicatorPattern};
use crate::control::control_loop::{ControlLoop, LoopKind, TickOutcome};
use crate::control::error::LoopError;
use crate::control::mode::{Mode, ModeState, ModeToggle};
use crate::controller::EventCache;
use crate::output::Indicator;
use std::sync::Arc;
use tracing::debug;

/// Sole writer of the [`ModeState`]
///
/// Toggle buttons are consumed, so each press flips the mode once no matter
/// how many ticks see it. The LEDs are refreshed on every tick.
pub struct IndicatorLoop {
    cache: Arc<EventCache>,
    mode: Arc<ModeState>,
    indicator: Box<dyn Indicator>,
    config: IndicatorConfig,
}

impl IndicatorLoop {
    pub fn new(
        cache: Arc<EventCache>,
        mode: Arc<ModeState>,
        indicator: Box<dyn Indicator>,
        config: IndicatorConfig,
    ) -> Self {
        Self {
            cache,
            mode,
            indicator,
            config,
        }
    }

    fn pattern_for(&self, mode: Mode) -> IndicatorPattern {
        match mode {
            Mode::Default => self.config.default_pattern,
            Mode::Maneuver => self.config.maneuver_pattern,
            Mode::Stick => self.config.stick_pattern,
        }
    }

    fn apply_toggles(&self) {
        let toggles = [
            (self.config.maneuver_toggle, ModeToggle::Maneuver),
            (self.config.stick_toggle, ModeToggle::Stick),
        ];
        for (channel, toggle) in toggles {
            if let Some(event) = self.cache.consume(channel) {
                if event.is_press() {
                    self.mode.toggle(toggle);
                } else {
                    debug!("Ignoring {} = {}", channel, event.value);
                }
            }
        }
    }
}

impl ControlLoop for IndicatorLoop {
    fn kind(&self) -> LoopKind {
        LoopKind::Indicator
    }

    fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        self.apply_toggles();

        let pattern = self.pattern_for(self.mode.current());
        self.indicator.indicate(pattern.command())?;
        Ok(TickOutcome::Issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Channel, ChannelEvent};
    use crate::output::{Command, CommandLog, IndicatorCommand, LedColor};

    fn press(cache: &EventCache, channel: Channel, value: i32) {
        cache.write(channel, ChannelEvent::from_timeval(2, 0, channel, value));
    }

    fn indicator_loop() -> (IndicatorLoop, Arc<EventCache>, Arc<ModeState>, CommandLog) {
        let cache = Arc::new(EventCache::new());
        let mode = Arc::new(ModeState::new());
        let log = CommandLog::new();
        let indicator = IndicatorLoop::new(
            Arc::clone(&cache),
            Arc::clone(&mode),
            Box::new(log.clone()),
            IndicatorConfig::default(),
        );
        (indicator, cache, mode, log)
    }

    fn last_indicator(log: &CommandLog) -> Option<IndicatorCommand> {
        log.commands().into_iter().rev().find_map(|c| match c {
            Command::Indicator(i) => Some(i),
            _ => None,
        })
    }

    #[test]
    fn reflects_mode_every_tick_without_input() {
        let (mut indicator, _, _, log) = indicator_loop();
        for _ in 0..3 {
            assert_eq!(indicator.tick().unwrap(), TickOutcome::Issued);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(
            last_indicator(&log),
            Some(IndicatorCommand::Set {
                left: LedColor::Green,
                right: LedColor::Green
            })
        );
    }

    #[test]
    fn press_toggles_once_and_release_is_ignored() {
        let (mut indicator, cache, mode, log) = indicator_loop();

        press(&cache, Channel::ButtonTriangle, 1);
        indicator.tick().unwrap();
        assert_eq!(mode.current(), Mode::Maneuver);

        // Consumed: the same press is not seen again
        indicator.tick().unwrap();
        assert_eq!(mode.current(), Mode::Maneuver);

        press(&cache, Channel::ButtonTriangle, 0);
        indicator.tick().unwrap();
        assert_eq!(mode.current(), Mode::Maneuver);
        assert_eq!(
            last_indicator(&log),
            Some(IndicatorCommand::Set {
                left: LedColor::Amber,
                right: LedColor::Amber
            })
        );

        press(&cache, Channel::ButtonTriangle, 1);
        indicator.tick().unwrap();
        assert_eq!(mode.current(), Mode::Default);
    }

    #[test]
    fn stick_toggle_replaces_maneuver_mode() {
        let (mut indicator, cache, mode, log) = indicator_loop();

        press(&cache, Channel::ButtonTriangle, 1);
        indicator.tick().unwrap();
        press(&cache, Channel::ButtonSquare, 1);
        indicator.tick().unwrap();

        assert_eq!(mode.current(), Mode::Stick);
        assert_eq!(
            last_indicator(&log),
            Some(IndicatorCommand::Set {
                left: LedColor::Green,
                right: LedColor::Orange
            })
        );
    }

    #[test]
    fn off_pattern_turns_leds_off() {
        let cache = Arc::new(EventCache::new());
        let mode = Arc::new(ModeState::new());
        let log = CommandLog::new();
        let config = IndicatorConfig {
            default_pattern: IndicatorPattern::Off,
            ..IndicatorConfig::default()
        };
        let mut indicator = IndicatorLoop::new(cache, mode, Box::new(log.clone()), config);

        indicator.tick().unwrap();
        assert_eq!(last_indicator(&log), Some(IndicatorCommand::AllOff));
    }
}
