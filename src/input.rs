//! Input polling: providers expose two axes and four buttons, the manager
//! merges them into one snapshot per update tick.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    One,
    Two,
    Three,
    Four,
}

impl Button {
    pub const ALL: [Button; 4] = [Button::One, Button::Two, Button::Three, Button::Four];

    fn index(self) -> usize {
        match self {
            Button::One => 0,
            Button::Two => 1,
            Button::Three => 2,
            Button::Four => 3,
        }
    }
}

/// A source of player input, polled once per update.
pub trait InputProvider {
    /// Horizontal axis, roughly −1 (left) … 1 (right).
    fn x(&self) -> f32;
    /// Vertical axis, roughly −1 (up) … 1 (down).
    fn y(&self) -> f32;
    fn button(&self, button: Button) -> bool;
    fn update(&mut self, _elapsed: f32) {}
}

/// Input as seen by game objects during one update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputState {
    pub x: f32,
    pub y: f32,
    buttons: [bool; 4],
}

impl InputState {
    pub fn new(x: f32, y: f32, buttons: [bool; 4]) -> Self {
        InputState {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
            buttons,
        }
    }

    pub fn button(&self, button: Button) -> bool {
        self.buttons[button.index()]
    }
}

#[derive(Default)]
pub struct InputManager {
    providers: Vec<Box<dyn InputProvider>>,
    state: InputState,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&mut self, provider: Box<dyn InputProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Update every provider and merge them: axes are summed and clamped,
    /// buttons are pressed if any provider reports them pressed.
    pub fn poll(&mut self, elapsed: f32) -> InputState {
        let mut x = 0.0;
        let mut y = 0.0;
        let mut buttons = [false; 4];
        for provider in &mut self.providers {
            provider.update(elapsed);
            x += provider.x();
            y += provider.y();
            for button in Button::ALL {
                buttons[button.index()] |= provider.button(button);
            }
        }
        self.state = InputState::new(x, y, buttons);
        self.state
    }

    /// The snapshot taken by the most recent `poll`.
    pub fn state(&self) -> InputState {
        self.state
    }
}

// ── Terminal keyboard ─────────────────────────────────────────────────────────

/// A key counts as held if its last press/repeat event arrived within this
/// many updates. Covers terminals that never report key releases: OS
/// key-repeat refreshes the key well before it expires.
const HOLD_WINDOW: u64 = 4;

/// Keyboard provider fed by crossterm events read on another thread.
///
/// Arrows / WASD drive the axes; Space or Z, X, C and V are buttons one to
/// four; Q, Esc and Ctrl-C raise the shared quit flag.
pub struct KeyboardInput {
    events: Receiver<Event>,
    key_frame: HashMap<KeyCode, u64>,
    frame: u64,
    quit: Rc<Cell<bool>>,
}

impl KeyboardInput {
    pub fn new(events: Receiver<Event>) -> Self {
        KeyboardInput {
            events,
            key_frame: HashMap::new(),
            frame: 0,
            quit: Rc::new(Cell::new(false)),
        }
    }

    /// Flag set once the player asks to quit.
    pub fn quit_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.quit)
    }

    fn is_held(&self, key: &KeyCode) -> bool {
        self.key_frame
            .get(key)
            .map(|&last| self.frame.saturating_sub(last) <= HOLD_WINDOW)
            .unwrap_or(false)
    }

    fn any_held(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|k| self.is_held(k))
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let code = normalize(key.code);
        match key.kind {
            KeyEventKind::Press => {
                self.key_frame.insert(code, self.frame);
                let quit = matches!(code, KeyCode::Char('q') | KeyCode::Esc)
                    || (code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL));
                if quit {
                    debug!("quit requested from keyboard");
                    self.quit.set(true);
                }
            }
            KeyEventKind::Repeat => {
                self.key_frame.insert(code, self.frame);
            }
            KeyEventKind::Release => {
                self.key_frame.remove(&code);
            }
        }
    }
}

fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

impl InputProvider for KeyboardInput {
    fn x(&self) -> f32 {
        let left = self.any_held(&[KeyCode::Left, KeyCode::Char('a')]);
        let right = self.any_held(&[KeyCode::Right, KeyCode::Char('d')]);
        (right as i32 - left as i32) as f32
    }

    fn y(&self) -> f32 {
        let up = self.any_held(&[KeyCode::Up, KeyCode::Char('w')]);
        let down = self.any_held(&[KeyCode::Down, KeyCode::Char('s')]);
        (down as i32 - up as i32) as f32
    }

    fn button(&self, button: Button) -> bool {
        match button {
            Button::One => self.any_held(&[KeyCode::Char(' '), KeyCode::Char('z')]),
            Button::Two => self.is_held(&KeyCode::Char('x')),
            Button::Three => self.is_held(&KeyCode::Char('c')),
            Button::Four => self.is_held(&KeyCode::Char('v')),
        }
    }

    fn update(&mut self, _elapsed: f32) {
        self.frame += 1;
        while let Ok(event) = self.events.try_recv() {
            if let Event::Key(key) = event {
                self.handle_key(key);
            }
        }
    }
}
