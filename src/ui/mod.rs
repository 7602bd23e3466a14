// SPDX-License-Identifier: GPL-3.0-only

//! Terminal user interface
//!
//! The UI thread owns the terminal. It drains preview frames, reads presenter
//! snapshots and spawns presenter operations on the tokio runtime; it never
//! waits on the camera or a filter render itself.

mod screens;
mod widgets;

pub use screens::{Action, NoticeTimer, Screen, action_for};
pub use widgets::{FilterStrip, ImageWidget, StatusBar};

use crate::camera::{CameraFrame, FrameReceiver};
use crate::constants::{pipeline, timing};
use crate::errors::AppResult;
use crate::permission::CameraAccess;
use crate::presenter::CameraPresenter;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::channel::mpsc;
use image::RgbaImage;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::future::Future;
use std::io::{self, stdout};
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// UI settings taken from the config
#[derive(Debug, Clone, Default)]
pub struct UiOptions {
    pub mirror_preview: bool,
}

/// Run the interactive camera until the user quits
pub fn run(
    presenter: CameraPresenter,
    runtime: Handle,
    access: CameraAccess,
    options: UiOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &presenter, &runtime, access, &options);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.block_on(presenter.release());
    result
}

/// Latest preview frame, converted lazily
struct PreviewSurface {
    receiver: FrameReceiver,
    pending: Option<CameraFrame>,
    image: Option<RgbaImage>,
}

impl PreviewSurface {
    fn new(receiver: FrameReceiver) -> Self {
        Self {
            receiver,
            pending: None,
            image: None,
        }
    }

    /// Keep only the newest queued frame
    fn drain(&mut self) {
        while let Ok(frame) = self.receiver.try_recv() {
            self.pending = Some(frame);
        }
    }

    /// Upright image of the newest frame
    fn image(&mut self) -> Option<&RgbaImage> {
        if let Some(frame) = self.pending.take() {
            match frame.to_upright_image() {
                Ok(image) => self.image = Some(image),
                Err(e) => debug!(error = %e, "Dropping preview frame"),
            }
        }
        self.image.as_ref()
    }

    fn clear(&mut self) {
        self.pending = None;
        self.image = None;
    }
}

fn spawn_operation<F, T>(runtime: &Handle, operation: &'static str, task: F)
where
    F: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    runtime.spawn(async move {
        // Failures already reached the status bar through a notice
        if let Err(e) = task.await {
            debug!(operation, error = %e, "Operation failed");
        }
    });
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    presenter: &CameraPresenter,
    runtime: &Handle,
    access: CameraAccess,
    options: &UiOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (sender, receiver) = mpsc::channel(pipeline::PREVIEW_CHANNEL_DEPTH);
    presenter.attach_preview(sender);
    let mut preview = PreviewSurface::new(receiver);

    match access {
        CameraAccess::Granted(route) => {
            info!(?route, "Camera access granted");
            let setup = presenter.clone();
            spawn_operation(runtime, "setup", async move { setup.setup().await });
        }
        CameraAccess::Denied(reason) => {
            warn!(reason = %reason, "Camera access denied");
            presenter.permission_denied();
        }
    }

    let filters = presenter.available_filters();
    let mut notices = NoticeTimer::default();
    let mut show_help = false;

    loop {
        preview.drain();

        let state = presenter.snapshot();
        let notice = notices.active(&state, Instant::now());
        let preview_image = preview.image();

        terminal.draw(|f| {
            f.render_widget(
                Screen {
                    state: &state,
                    preview: preview_image,
                    notice,
                    show_help,
                    mirror_preview: options.mirror_preview,
                    filters,
                },
                f.area(),
            );
        })?;

        if !event::poll(timing::UI_POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let Some(action) = action_for(key, state.phase) else {
            continue;
        };
        debug!(?action, phase = ?state.phase, "Key action");

        match action {
            Action::Quit => break,
            Action::ToggleHelp => show_help = !show_help,
            Action::Shutter => {
                let p = presenter.clone();
                spawn_operation(runtime, "take photo", async move { p.take_photo().await });
            }
            Action::NextFilter => {
                let filter = presenter.snapshot().selected_filter.next();
                spawn_operation(runtime, "apply filter", presenter.apply_filter(filter));
            }
            Action::PreviousFilter => {
                let filter = presenter.snapshot().selected_filter.previous();
                spawn_operation(runtime, "apply filter", presenter.apply_filter(filter));
            }
            Action::Save => {
                let p = presenter.clone();
                spawn_operation(runtime, "save", async move { p.save().await });
            }
            Action::Reset => {
                // Old frames must not flash up before the camera restarts
                preview.clear();
                let p = presenter.clone();
                spawn_operation(runtime, "reset", async move { p.reset().await });
            }
        }
    }

    Ok(())
}
