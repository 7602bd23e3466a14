// SPDX-License-Identifier: GPL-3.0-only

//! Preview and review screens

use super::widgets::{FilterStrip, ImageWidget, StatusBar};
use crate::constants::timing;
use crate::filters::FilterType;
use crate::presenter::{Notice, Phase, ViewState};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use image::RgbaImage;
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};
use std::time::{Duration, Instant};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shutter,
    NextFilter,
    PreviousFilter,
    Save,
    Reset,
    ToggleHelp,
    Quit,
}

/// Map a key press to an action for the current screen
pub fn action_for(key: KeyEvent, phase: Phase) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    match (key.code, phase) {
        (KeyCode::Char('q'), _) => Some(Action::Quit),
        (KeyCode::Char('h'), _) => Some(Action::ToggleHelp),
        (KeyCode::Left, _) => Some(Action::PreviousFilter),
        (KeyCode::Right, _) => Some(Action::NextFilter),
        (KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('p'), Phase::Previewing) => {
            Some(Action::Shutter)
        }
        (KeyCode::Char('s'), Phase::Reviewing) => Some(Action::Save),
        (KeyCode::Char('r') | KeyCode::Esc, Phase::Reviewing) => Some(Action::Reset),
        _ => None,
    }
}

fn hints(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "'q' quit",
        Phase::Previewing => "space shutter | ←/→ filter | 'h' help | 'q' quit",
        Phase::Capturing => "Capturing...",
        Phase::Reviewing => "←/→ filter | 's' save | 'r' retake | 'q' quit",
    }
}

fn help(phase: Phase) -> &'static str {
    match phase {
        Phase::Reviewing => "Left/Right: Change filter | s: Save | r/Esc: Retake | h: Toggle help | q/Ctrl+C: Quit",
        _ => "Space/Enter/p: Take picture | Left/Right: Preselect filter | h: Toggle help | q/Ctrl+C: Quit",
    }
}

/// Keeps each notice on screen for a fixed time
#[derive(Debug, Default)]
pub struct NoticeTimer {
    seen_id: u64,
    shown_at: Option<Instant>,
}

impl NoticeTimer {
    /// The notice to show at `now`, if it has not expired
    pub fn active<'a>(&mut self, state: &'a ViewState, now: Instant) -> Option<&'a Notice> {
        self.active_for(state, now, timing::NOTICE_DURATION)
    }

    fn active_for<'a>(
        &mut self,
        state: &'a ViewState,
        now: Instant,
        duration: Duration,
    ) -> Option<&'a Notice> {
        if state.notice_id != self.seen_id {
            self.seen_id = state.notice_id;
            self.shown_at = Some(now);
        }

        let shown_at = self.shown_at?;
        if now.duration_since(shown_at) < duration {
            state.notice.as_ref()
        } else {
            self.shown_at = None;
            None
        }
    }
}

/// The whole terminal: image, filter strip and status line
pub struct Screen<'a> {
    pub state: &'a ViewState,
    /// Latest upright preview frame
    pub preview: Option<&'a RgbaImage>,
    pub notice: Option<&'a Notice>,
    pub show_help: bool,
    pub mirror_preview: bool,
    pub filters: &'a [FilterType],
}

impl Screen<'_> {
    fn status(&self) -> (String, bool) {
        if let Some(notice) = self.notice {
            return (notice.message(), notice.is_error());
        }
        if self.show_help {
            return (help(self.state.phase).to_string(), false);
        }
        let mut message = hints(self.state.phase).to_string();
        if let Some(camera) = &self.state.camera_name
            && self.state.phase == Phase::Previewing
        {
            message = format!("{} | {}", camera, message);
        }
        (message, false)
    }
}

impl Widget for Screen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 3 {
            return;
        }

        let image_area = Rect {
            height: area.height - 2,
            ..area
        };
        let strip_area = Rect {
            y: area.y + area.height - 2,
            height: 1,
            ..area
        };
        let status_area = Rect {
            y: area.y + area.height - 1,
            height: 1,
            ..area
        };

        match self.state.phase {
            Phase::Idle => ImageWidget {
                image: None,
                placeholder: "Camera is off",
                mirror: false,
            }
            .render(image_area, buf),
            Phase::Previewing | Phase::Capturing => ImageWidget {
                image: self.preview,
                placeholder: "Waiting for camera...",
                mirror: self.mirror_preview,
            }
            .render(image_area, buf),
            Phase::Reviewing => ImageWidget {
                image: self.state.displayed.as_deref(),
                placeholder: "Rendering...",
                mirror: false,
            }
            .render(image_area, buf),
        }

        FilterStrip {
            filters: self.filters,
            selected: self.state.selected_filter,
        }
        .render(strip_area, buf);

        let (message, error) = self.status();
        StatusBar {
            message: &message,
            error,
        }
        .render(status_area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;
    use image::Rgba;
    use std::sync::Arc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_shutter_only_while_previewing() {
        assert_eq!(
            action_for(key(KeyCode::Char(' ')), Phase::Previewing),
            Some(Action::Shutter)
        );
        assert_eq!(action_for(key(KeyCode::Char(' ')), Phase::Reviewing), None);
        assert_eq!(action_for(key(KeyCode::Char(' ')), Phase::Capturing), None);
    }

    #[test]
    fn test_review_keys() {
        assert_eq!(
            action_for(key(KeyCode::Char('s')), Phase::Reviewing),
            Some(Action::Save)
        );
        assert_eq!(
            action_for(key(KeyCode::Esc), Phase::Reviewing),
            Some(Action::Reset)
        );
        assert_eq!(action_for(key(KeyCode::Char('s')), Phase::Previewing), None);
        assert_eq!(
            action_for(key(KeyCode::Right), Phase::Reviewing),
            Some(Action::NextFilter)
        );
    }

    #[test]
    fn test_ctrl_c_quits_everywhere() {
        let ctrl_c = KeyEvent {
            kind: KeyEventKind::Press,
            ..KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        };
        assert_eq!(action_for(ctrl_c, Phase::Idle), Some(Action::Quit));
        assert_eq!(action_for(ctrl_c, Phase::Capturing), Some(Action::Quit));
    }

    #[test]
    fn test_notice_expires() {
        let mut timer = NoticeTimer::default();
        let state = ViewState {
            notice: Some(Notice::PermissionDenied),
            notice_id: 1,
            ..ViewState::default()
        };
        let start = Instant::now();
        let duration = Duration::from_secs(2);

        assert!(timer.active_for(&state, start, duration).is_some());
        assert!(
            timer
                .active_for(&state, start + Duration::from_secs(1), duration)
                .is_some()
        );
        assert!(
            timer
                .active_for(&state, start + Duration::from_secs(3), duration)
                .is_none()
        );

        // The same notice published again shows again
        let again = ViewState {
            notice_id: 2,
            ..state.clone()
        };
        assert!(
            timer
                .active_for(&again, start + Duration::from_secs(4), duration)
                .is_some()
        );
    }

    #[test]
    fn test_review_screen_shows_displayed_image() {
        let displayed = Arc::new(RgbaImage::from_pixel(8, 4, Rgba([0, 255, 0, 255])));
        let state = ViewState {
            phase: Phase::Reviewing,
            displayed: Some(displayed),
            selected_filter: FilterType::Sepia,
            ..ViewState::default()
        };
        let area = Rect::new(0, 0, 40, 12);
        let mut buf = Buffer::empty(area);

        Screen {
            state: &state,
            preview: None,
            notice: None,
            show_help: false,
            mirror_preview: false,
            filters: &FilterType::ALL,
        }
        .render(area, &mut buf);

        assert_eq!(buf[(20, 5)].fg, ratatui::style::Color::Rgb(0, 255, 0));
        let status: String = (0..40).map(|x| buf[(x, 11)].symbol().to_string()).collect();
        assert!(status.contains("'s' save"));
    }
}
