//! Keyboard and mouse translation for the viewer, plus the numeric count
//! prefix. Nothing here touches the terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::gesture::TouchKind;

const MAX_PAGE_NUM: u32 = 999_999;

/// Digits typed ahead of a command. `12g` goes to page 12 and `3l`
/// turns three pages; any other key drops the prefix.
#[derive(Debug, Default)]
pub(super) struct InputAccumulator {
    digits: Option<u32>,
}

impl InputAccumulator {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Digits that would carry the prefix past `MAX_PAGE_NUM` are dropped.
    fn push_digit(&mut self, digit: u32) {
        let next = self
            .digits
            .unwrap_or(0)
            .saturating_mul(10)
            .saturating_add(digit);
        if next <= MAX_PAGE_NUM {
            self.digits = Some(next);
        }
    }

    fn take(&mut self) -> Option<u32> {
        self.digits.take()
    }

    /// Repeat count for a motion key, 1 when nothing was typed.
    fn repeat(&mut self) -> u32 {
        self.take().unwrap_or(1)
    }

    /// Shown in the status bar while the user is typing.
    pub(super) fn peek(&self) -> Option<u32> {
        self.digits
    }

    pub(super) fn reset(&mut self) {
        self.digits = None;
    }
}

/// Actions produced by key input processing.
#[derive(Debug)]
pub(super) enum Action {
    Quit,
    PageLeft(u32),
    PageRight(u32),
    ScrollDown(u32),
    ScrollUp(u32),
    ZoomIn,
    ZoomOut,
    ToggleZoom,
    CycleLayout,
    CycleScale,
    JumpToFirst,
    JumpToLast,
    /// 1-based page number.
    JumpToPage(u32),
    Retry,
    CancelInput,
    /// A digit was accumulated; caller should redraw status bar.
    Digit,
}

/// Map a key event to an `Action`, consuming/updating the accumulator as needed.
///
/// Returns `None` for unknown keys (caller should reset accumulator).
pub(super) fn map_key_event(key: KeyEvent, acc: &mut InputAccumulator) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = key;

    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            Some(Action::Quit)
        }

        // Esc: cancel pending input
        (KeyCode::Esc, _) => {
            acc.reset();
            Some(Action::CancelInput)
        }

        // Digits: accumulate
        (KeyCode::Char(c @ '0'..='9'), KeyModifiers::NONE) => {
            acc.push_digit(c as u32 - '0' as u32);
            Some(Action::Digit)
        }

        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => {
            Some(Action::PageLeft(acc.repeat()))
        }
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) | (KeyCode::Char(' '), _) => {
            Some(Action::PageRight(acc.repeat()))
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => {
            Some(Action::ScrollDown(acc.repeat()))
        }
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => {
            Some(Action::ScrollUp(acc.repeat()))
        }

        (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => {
            acc.reset();
            Some(Action::ZoomIn)
        }
        (KeyCode::Char('-'), _) => {
            acc.reset();
            Some(Action::ZoomOut)
        }
        (KeyCode::Char('z'), _) => {
            acc.reset();
            Some(Action::ToggleZoom)
        }
        (KeyCode::Char('m'), _) => {
            acc.reset();
            Some(Action::CycleLayout)
        }
        (KeyCode::Char('s'), _) => {
            acc.reset();
            Some(Action::CycleScale)
        }
        (KeyCode::Char('r'), _) => {
            acc.reset();
            Some(Action::Retry)
        }

        // First page / jump
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => match acc.take() {
            None => Some(Action::JumpToFirst),
            Some(n) => Some(Action::JumpToPage(n)),
        },
        // Last page / jump
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => match acc.take() {
            None => Some(Action::JumpToLast),
            Some(n) => Some(Action::JumpToPage(n)),
        },

        _ => None,
    }
}

/// A mouse event reduced to what the viewer acts on. Coordinates are
/// terminal cells.
#[derive(Debug, PartialEq)]
pub(super) enum Pointer {
    Touch { kind: TouchKind, col: u16, row: u16 },
    /// Wheel notches; positive scrolls down.
    Wheel(i32),
}

/// The left button acts as a single finger; the wheel scrolls.
pub(super) fn map_mouse_event(ev: MouseEvent) -> Option<Pointer> {
    let MouseEvent {
        kind, column, row, ..
    } = ev;
    let touch = |kind| {
        Some(Pointer::Touch {
            kind,
            col: column,
            row,
        })
    };
    match kind {
        MouseEventKind::Down(MouseButton::Left) => touch(TouchKind::Down),
        MouseEventKind::Drag(MouseButton::Left) => touch(TouchKind::Move),
        MouseEventKind::Up(MouseButton::Left) => touch(TouchKind::Up),
        MouseEventKind::ScrollDown => Some(Pointer::Wheel(1)),
        MouseEventKind::ScrollUp => Some(Pointer::Wheel(-1)),
        _ => None,
    }
}
