// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Running the interactive terminal camera
//! - Listing cameras and filters
//! - Taking a filtered photo headlessly
//! - Filtering an existing image file

use filter_camera::camera::{
    CameraBackend, CameraController, CameraSettings, GStreamerBackend, SyntheticBackend,
    SyntheticSource,
};
use filter_camera::config::Config;
use filter_camera::constants::APP_NAME;
use filter_camera::filters::{FilterApplier, FilterType, RenderMode};
use filter_camera::permission::{CameraAccess, request_camera_access};
use filter_camera::presenter::{CameraPresenter, PresenterOptions};
use filter_camera::storage::ImagePersister;
use filter_camera::ui::{self, UiOptions};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Flags shared by every command
pub struct Options {
    /// Image streamed by the synthetic backend instead of a camera
    pub source: Option<PathBuf>,
    pub force_cpu: bool,
    pub config_path: Option<PathBuf>,
}

impl Options {
    fn load_config(&self) -> Result<Config, Box<dyn Error>> {
        let mut config = match &self.config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load(),
        };
        if self.force_cpu {
            config.render_mode = RenderMode::Cpu;
        }
        Ok(config)
    }

    fn backend(&self) -> Arc<dyn CameraBackend> {
        match &self.source {
            Some(path) => Arc::new(SyntheticBackend::new(SyntheticSource::File(path.clone()))),
            None => Arc::new(GStreamerBackend::new()),
        }
    }
}

/// Set up tracing; the interactive UI logs to a file so the terminal stays clean
pub fn init_logging(interactive: bool) {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if !interactive {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .init();
        return;
    }

    let log_file = dirs::cache_dir().and_then(|dir| {
        let dir = dir.join(APP_NAME);
        std::fs::create_dir_all(&dir).ok()?;
        std::fs::File::create(dir.join(format!("{}.log", APP_NAME))).ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::sink)
            .init(),
    }
}

fn parse_filter(name: &str) -> Result<FilterType, Box<dyn Error>> {
    FilterType::from_name(name).ok_or_else(|| {
        format!(
            "Unknown filter '{}' (see 'filter-camera filters' for the list)",
            name
        )
        .into()
    })
}

fn build_presenter(
    options: &Options,
    config: &Config,
) -> Result<(CameraPresenter, ImagePersister), Box<dyn Error>> {
    let camera = CameraController::new(options.backend(), CameraSettings::from_config(config))?;
    let persister = ImagePersister::from_config(config)?;
    let presenter = CameraPresenter::new(
        Arc::new(camera),
        persister.clone(),
        PresenterOptions::from_config(config),
    );
    Ok((presenter, persister))
}

/// Run the interactive terminal camera
pub fn run_interactive(options: &Options) -> Result<(), Box<dyn Error>> {
    let config = options.load_config()?;
    let runtime = tokio::runtime::Runtime::new()?;
    let (presenter, _) = build_presenter(options, &config)?;

    let access = runtime.block_on(request_camera_access(
        config.camera_path.as_deref(),
        options.source.is_some(),
    ));

    let ui_options = UiOptions {
        mirror_preview: config.mirror_preview,
    };
    ui::run(presenter, runtime.handle().clone(), access, ui_options)
}

/// List all available cameras
pub fn list_cameras(options: &Options) -> Result<(), Box<dyn Error>> {
    let config = options.load_config()?;
    let runtime = tokio::runtime::Runtime::new()?;
    let camera = CameraController::new(options.backend(), CameraSettings::from_config(&config))?;

    let cameras = runtime.block_on(camera.list_cameras())?;
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", camera.backend_name());
    println!();
    for camera in &cameras {
        println!("  {}", camera.name);
        println!("      Path: {}", camera.path);
        if camera.rotation.degrees() != 0 {
            println!("      Rotation: {}", camera.rotation);
        }
    }

    Ok(())
}

/// List filters in filter-strip order
pub fn list_filters() -> Result<(), Box<dyn Error>> {
    for filter in FilterType::ALL {
        println!("{}", filter.display_name().to_lowercase());
    }
    Ok(())
}

/// Take one filtered photo
pub fn take_photo(
    options: &Options,
    filter: &str,
    output: Option<PathBuf>,
    camera: Option<String>,
    open_result: bool,
) -> Result<(), Box<dyn Error>> {
    let filter = parse_filter(filter)?;
    let mut config = options.load_config()?;
    if camera.is_some() {
        config.camera_path = camera;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let access = runtime.block_on(request_camera_access(
        config.camera_path.as_deref(),
        options.source.is_some(),
    ));
    if let CameraAccess::Denied(reason) = access {
        return Err(format!("Camera permission denied: {}", reason).into());
    }

    let (presenter, persister) = build_presenter(options, &config)?;
    let result = runtime.block_on(capture_photo(&presenter, &persister, filter, output));
    runtime.block_on(presenter.release());

    let path = result?;
    println!("Saved: {}", path.display());
    if open_result {
        show(&path);
    }
    Ok(())
}

async fn capture_photo(
    presenter: &CameraPresenter,
    persister: &ImagePersister,
    filter: FilterType,
    output: Option<PathBuf>,
) -> Result<PathBuf, Box<dyn Error>> {
    let renderer = presenter.setup().await?;
    println!("Renderer: {}", renderer);
    if let Some(camera) = presenter.snapshot().camera_name {
        println!("Using camera: {}", camera);
    }

    presenter.apply_filter(filter).await?;
    println!("Capturing...");
    presenter.take_photo().await?;

    match output {
        Some(path) => {
            let displayed = presenter
                .snapshot()
                .displayed
                .ok_or("No image was captured")?;
            Ok(persister.export_image(displayed, path).await?)
        }
        None => {
            let saved = presenter.save().await?.ok_or("No image was captured")?;
            Ok(saved.path)
        }
    }
}

/// Default output for `apply`: `<stem>-<filter>.jpg` next to the input
fn filtered_output_path(input: &Path, filter: FilterType) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!(
        "{}-{}.jpg",
        stem,
        filter.display_name().to_lowercase()
    ))
}

/// Apply a filter to an image file
pub fn apply_filter(
    options: &Options,
    input: &Path,
    filter: &str,
    output: Option<PathBuf>,
    open_result: bool,
) -> Result<(), Box<dyn Error>> {
    let filter = parse_filter(filter)?;
    let config = options.load_config()?;
    let output = output.unwrap_or_else(|| filtered_output_path(input, filter));

    let image = Arc::new(image::open(input)?.to_rgba8());
    println!(
        "Input: {} ({}x{})",
        input.display(),
        image.width(),
        image.height()
    );

    let persister = ImagePersister::from_config(&config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let path = runtime.block_on(async {
        let applier = FilterApplier::new();
        let renderer = applier.setup(config.render_mode).await?;
        println!("Renderer: {}", renderer);

        let rendered = applier.apply(&image, filter).await?;
        let path = persister.export_image(Arc::new(rendered), output).await?;
        Ok::<_, Box<dyn Error>>(path)
    })?;

    println!("Saved: {}", path.display());
    if open_result {
        show(&path);
    }
    Ok(())
}

/// Open a saved image in the desktop's default viewer
fn show(path: &Path) {
    if let Err(e) = open::that(path) {
        warn!(path = %path.display(), error = %e, "Failed to open image viewer");
        eprintln!("Could not open {}: {}", path.display(), e);
    }
}
