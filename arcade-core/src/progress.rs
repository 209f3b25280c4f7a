//! Page-loading progress bar.
//!
//! The bar creeps toward the end while a navigation is in flight and races
//! to it, then fades out, once the navigation stops. Painting and timers
//! belong to the caller; this is only the state.
use std::time::Duration;

/// Delay before the bar appears, so fast navigations don't flicker.
pub const SHOW_DELAY: Duration = Duration::from_millis(300);

const CREEP_RATE: f64 = 0.05;
const FINISH_STEP: f64 = 0.1;
const FADE_STEP: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    /// Gradient stops across the page width, `(offset, css color)`.
    pub bar_colors: Vec<(f64, String)>,
    pub shadow_color: String,
    pub bar_thickness: f64,
    pub shadow_blur: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            bar_colors: vec![(0., "#29d".to_owned())],
            shadow_color: "rgba(0, 0, 0, .3)".to_owned(),
            bar_thickness: 3.,
            shadow_blur: 10.,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Hidden,
    Pending,
    Showing,
    Fading,
}

/// What to paint this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub progress: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    phase: Phase,
    progress: f64,
    opacity: f64,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBar {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Hidden,
            progress: 0.,
            opacity: 0.,
        }
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Arms a delayed show. Returns `true` when the caller should start
    /// the delay timer and call [`Self::delay_elapsed`] when it fires.
    pub fn show_after(&mut self) -> bool {
        match self.phase {
            Phase::Hidden | Phase::Fading => {
                self.phase = Phase::Pending;
                true
            }
            Phase::Pending | Phase::Showing => false,
        }
    }

    /// The delay timer fired. Returns `true` if the bar is now showing.
    pub fn delay_elapsed(&mut self) -> bool {
        if self.phase != Phase::Pending {
            return false;
        }
        self.show();
        true
    }

    pub fn show(&mut self) {
        if self.phase == Phase::Showing {
            return;
        }
        self.phase = Phase::Showing;
        self.progress = 0.;
        self.opacity = 1.;
    }

    /// Returns `true` when a pending delay timer should be cancelled.
    pub fn hide(&mut self) -> bool {
        match self.phase {
            Phase::Pending => {
                self.phase = if self.opacity > 0. {
                    Phase::Fading
                } else {
                    Phase::Hidden
                };
                true
            }
            Phase::Showing => {
                self.phase = Phase::Fading;
                false
            }
            Phase::Hidden | Phase::Fading => false,
        }
    }

    /// Advances one animation frame. `None` means nothing is on screen.
    pub fn tick(&mut self) -> Option<Paint> {
        match self.phase {
            Phase::Hidden => return None,
            Phase::Showing => {
                let creep = CREEP_RATE * (1. - self.progress.sqrt()).powi(2);
                self.progress = (self.progress + creep).min(1.);
            }
            // a bar re-armed mid-fade keeps fading until the delay elapses
            Phase::Pending | Phase::Fading => {
                if self.opacity <= 0. {
                    return None;
                }
                self.progress = (self.progress + FINISH_STEP).min(1.);
                if self.progress >= 1. {
                    self.opacity -= FADE_STEP;
                    if self.opacity <= FADE_STEP {
                        if self.phase == Phase::Fading {
                            self.phase = Phase::Hidden;
                        }
                        self.progress = 0.;
                        self.opacity = 0.;
                        return None;
                    }
                }
            }
        }
        Some(Paint {
            progress: self.progress,
            opacity: self.opacity,
        })
    }
}
