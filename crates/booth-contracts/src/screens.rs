use std::fmt;
use std::time::{Duration, Instant};

/// The five exclusive UI surfaces. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Welcome,
    Camera,
    Character,
    Loading,
    Result,
}

impl Screen {
    pub const ALL: [Screen; 5] = [
        Screen::Welcome,
        Screen::Camera,
        Screen::Character,
        Screen::Loading,
        Screen::Result,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::Camera => "camera",
            Screen::Character => "character",
            Screen::Loading => "loading",
            Screen::Result => "result",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overlays that stack on top of whichever screen is active; orthogonal to
/// screen state, never exclusive with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    Share,
    Accessory,
    Personalized,
}

#[derive(Debug)]
pub enum NavigationError {
    /// A transition is already in flight (a hook re-entered the navigator).
    InFlight,
    /// The post-transition cooldown has not elapsed.
    Cooldown,
    /// The requested edge is not in the transition table.
    Blocked { from: Screen, to: Screen },
    /// A pre- or post-hook failed. A failed pre-hook aborts the transition;
    /// a failed post-hook reports after the swap already happened.
    Hook(anyhow::Error),
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::InFlight => write!(f, "navigation already in flight"),
            NavigationError::Cooldown => write!(f, "navigation cooldown has not elapsed"),
            NavigationError::Blocked { from, to } => {
                write!(f, "transition {from} -> {to} is not allowed")
            }
            NavigationError::Hook(err) => write!(f, "transition hook failed: {err:#}"),
        }
    }
}

impl std::error::Error for NavigationError {}

/// Side effects to run around a transition, e.g. starting the camera before
/// entering `camera` or stopping it on the way out.
#[derive(Default)]
pub struct TransitionHooks<'a> {
    before: Option<Box<dyn FnOnce() -> anyhow::Result<()> + 'a>>,
    after: Option<Box<dyn FnOnce() -> anyhow::Result<()> + 'a>>,
}

impl<'a> TransitionHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, hook: impl FnOnce() -> anyhow::Result<()> + 'a) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    pub fn after(mut self, hook: impl FnOnce() -> anyhow::Result<()> + 'a) -> Self {
        self.after = Some(Box::new(hook));
        self
    }
}

/// Single-active-screen state machine with guarded, single-flight transitions.
///
/// Screen visibility is derived purely from the active state (`is_visible`)
/// rather than toggled ad hoc at call sites. A short cooldown after each
/// transition absorbs duplicate triggers from double-fired UI events.
#[derive(Debug)]
pub struct ScreenNavigator {
    active: Screen,
    modal: Option<Modal>,
    navigating: bool,
    cooldown: Duration,
    cooldown_until: Option<Instant>,
}

pub const DEFAULT_NAVIGATION_COOLDOWN: Duration = Duration::from_millis(50);

impl Default for ScreenNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenNavigator {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_NAVIGATION_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            active: Screen::Welcome,
            modal: None,
            navigating: false,
            cooldown,
            cooldown_until: None,
        }
    }

    pub fn active(&self) -> Screen {
        self.active
    }

    /// Derived visibility: true for exactly one screen.
    pub fn is_visible(&self, screen: Screen) -> bool {
        self.active == screen
    }

    pub fn modal(&self) -> Option<Modal> {
        self.modal
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    fn allowed(from: Screen, to: Screen) -> bool {
        matches!(
            (from, to),
            (Screen::Welcome, Screen::Camera)
                | (Screen::Camera, Screen::Character)
                | (Screen::Camera, Screen::Welcome)
                | (Screen::Character, Screen::Camera)
                | (Screen::Character, Screen::Loading)
                | (Screen::Loading, Screen::Result)
                | (Screen::Loading, Screen::Character)
                | (Screen::Result, Screen::Welcome)
        )
    }

    pub fn navigate(&mut self, to: Screen) -> Result<(), NavigationError> {
        self.navigate_with(to, TransitionHooks::new())
    }

    /// Runs `before`, atomically swaps the active screen, then runs `after`.
    /// Re-entrant calls and calls inside the cooldown window are rejected
    /// without side effects.
    pub fn navigate_with(
        &mut self,
        to: Screen,
        hooks: TransitionHooks<'_>,
    ) -> Result<(), NavigationError> {
        if self.navigating {
            return Err(NavigationError::InFlight);
        }
        if let Some(until) = self.cooldown_until {
            if Instant::now() < until {
                return Err(NavigationError::Cooldown);
            }
        }
        if !Self::allowed(self.active, to) {
            return Err(NavigationError::Blocked {
                from: self.active,
                to,
            });
        }

        self.navigating = true;
        let result = (|| {
            if let Some(before) = hooks.before {
                before().map_err(NavigationError::Hook)?;
            }
            self.active = to;
            if let Some(after) = hooks.after {
                after().map_err(NavigationError::Hook)?;
            }
            Ok(())
        })();
        self.navigating = false;
        self.cooldown_until = Some(Instant::now() + self.cooldown);
        result
    }

    /// Explicit reset: any state back to `welcome`, modal closed. Not subject
    /// to the transition table or the cooldown window.
    pub fn reset(&mut self) {
        self.active = Screen::Welcome;
        self.modal = None;
        self.navigating = false;
        self.cooldown_until = Some(Instant::now() + self.cooldown);
    }
}
