use crate::domain::models::{TimerMode, TimerSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFocusSession {
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomodoroTimer {
    mode: TimerMode,
    seconds_left: u32,
    is_active: bool,
    sessions_completed: u32,
}

impl PomodoroTimer {
    pub const SESSIONS_PER_LONG_BREAK: u32 = 4;

    pub fn new(settings: &TimerSettings) -> Self {
        Self {
            mode: TimerMode::Work,
            seconds_left: settings.seconds_for(TimerMode::Work),
            is_active: false,
            sessions_completed: 0,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn sessions_completed(&self) -> u32 {
        self.sessions_completed
    }

    pub fn toggle(&mut self) -> bool {
        self.is_active = !self.is_active;
        self.is_active
    }

    pub fn reset(&mut self, settings: &TimerSettings) {
        self.seconds_left = settings.seconds_for(self.mode);
        self.is_active = false;
    }

    pub fn switch_mode(&mut self, settings: &TimerSettings, mode: TimerMode) {
        self.mode = mode;
        self.seconds_left = settings.seconds_for(mode);
        self.is_active = false;
    }

    // Settings edits reach a running countdown only at the next reset, switch,
    // or expiry; an idle timer picks them up immediately.
    pub fn apply_settings(&mut self, settings: &TimerSettings) {
        if !self.is_active {
            self.seconds_left = settings.seconds_for(self.mode);
        }
    }

    pub fn tick(&mut self, settings: &TimerSettings) -> Option<CompletedFocusSession> {
        if !self.is_active {
            return None;
        }
        if self.seconds_left > 0 {
            self.seconds_left -= 1;
        }
        if self.seconds_left > 0 {
            return None;
        }
        self.expire(settings)
    }

    fn expire(&mut self, settings: &TimerSettings) -> Option<CompletedFocusSession> {
        match self.mode {
            TimerMode::Work => {
                self.sessions_completed += 1;
                let next_mode = if self.sessions_completed % Self::SESSIONS_PER_LONG_BREAK == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                };
                let minutes = settings.work_minutes;
                self.switch_mode(settings, next_mode);
                Some(CompletedFocusSession { minutes })
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                self.switch_mode(settings, TimerMode::Work);
                None
            }
        }
    }
}
