// SPDX-License-Identifier: CEPL-1.0
use lantern_platform::PlatformEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppState {
    pub running: bool,
    pub focused: bool,
    pub occluded: bool,
    pub minimized: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            running: true,
            focused: true,
            occluded: false,
            minimized: false,
        }
    }
}

impl AppState {
    /// Nothing visible to draw into.
    pub fn paused(&self) -> bool {
        self.occluded || self.minimized
    }
}

/// What the main loop should do this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameActions {
    pub exit: bool,
    pub render: bool,
    /// Camera input is applied only while focused.
    pub steer: bool,
}

/// Folds this tick's platform events into the state.
pub fn step(mut state: AppState, events: &[PlatformEvent]) -> (AppState, FrameActions) {
    for event in events {
        match *event {
            PlatformEvent::CloseRequested | PlatformEvent::EscapePressed => state.running = false,
            PlatformEvent::Resized(size) => state.minimized = size.is_empty(),
            PlatformEvent::Focused(focused) => state.focused = focused,
            PlatformEvent::Occluded(occluded) => state.occluded = occluded,
        }
    }
    let actions = FrameActions {
        exit: !state.running,
        render: state.running && !state.paused(),
        steer: state.running && state.focused,
    };
    (state, actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_render::RenderSize;

    #[test]
    fn quiet_tick_renders() {
        let (state, actions) = step(AppState::default(), &[]);
        assert_eq!(state, AppState::default());
        assert!(actions.render && actions.steer && !actions.exit);
    }

    #[test]
    fn escape_and_close_both_exit() {
        for event in [PlatformEvent::EscapePressed, PlatformEvent::CloseRequested] {
            let (state, actions) = step(AppState::default(), &[event]);
            assert!(!state.running);
            assert!(actions.exit && !actions.render);
        }
    }

    #[test]
    fn minimise_pauses_until_restored() {
        let (state, actions) = step(AppState::default(), &[PlatformEvent::Resized(RenderSize::new(0, 0))]);
        assert!(state.minimized && !actions.render);

        let (state, actions) = step(state, &[PlatformEvent::Resized(RenderSize::new(640, 480))]);
        assert!(!state.minimized && actions.render);
    }

    #[test]
    fn last_event_of_a_kind_wins() {
        let events = [
            PlatformEvent::Focused(false),
            PlatformEvent::Occluded(true),
            PlatformEvent::Occluded(false),
        ];
        let (state, actions) = step(AppState::default(), &events);
        assert!(!state.focused && !state.occluded);
        assert!(actions.render && !actions.steer);
    }
}
