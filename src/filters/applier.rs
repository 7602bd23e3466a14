// SPDX-License-Identifier: GPL-3.0-only

//! Filter applier
//!
//! Binds a rendering context once and renders catalog filters over captured
//! images. The GPU pipeline sits behind an async mutex; CPU renders run on the
//! blocking pool.

use super::catalog::FilterCatalog;
use super::gpu::GpuFilterPipeline;
use super::{FilterType, cpu};
use crate::errors::FilterError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Which renderer `setup` should bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// wgpu when an adapter is available, CPU otherwise
    #[default]
    Auto,
    /// wgpu only; setup fails without an adapter
    Gpu,
    /// CPU renderer only
    Cpu,
}

/// Renderer bound by `setup`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderBackend {
    Gpu { adapter: String },
    Cpu,
}

impl std::fmt::Display for RenderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderBackend::Gpu { adapter } => write!(f, "GPU ({})", adapter),
            RenderBackend::Cpu => write!(f, "CPU"),
        }
    }
}

enum Context {
    Unbound,
    Cpu,
    Gpu(Box<GpuFilterPipeline>),
}

/// Renders filters over images on the bound context
pub struct FilterApplier {
    catalog: FilterCatalog,
    context: Mutex<Context>,
}

impl Default for FilterApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterApplier {
    pub fn new() -> Self {
        Self {
            catalog: FilterCatalog::new(),
            context: Mutex::new(Context::Unbound),
        }
    }

    /// Bind the rendering context. A second call keeps the existing context.
    pub async fn setup(&self, mode: RenderMode) -> Result<RenderBackend, FilterError> {
        let mut context = self.context.lock().await;

        match &*context {
            Context::Gpu(pipeline) => {
                return Ok(RenderBackend::Gpu {
                    adapter: pipeline.device_info().adapter_name.clone(),
                });
            }
            Context::Cpu => return Ok(RenderBackend::Cpu),
            Context::Unbound => {}
        }

        let backend = match mode {
            RenderMode::Cpu => {
                *context = Context::Cpu;
                RenderBackend::Cpu
            }
            RenderMode::Gpu => {
                let pipeline = GpuFilterPipeline::new()
                    .await
                    .map_err(FilterError::GpuUnavailable)?;
                let adapter = pipeline.device_info().adapter_name.clone();
                *context = Context::Gpu(Box::new(pipeline));
                RenderBackend::Gpu { adapter }
            }
            RenderMode::Auto => match GpuFilterPipeline::new().await {
                Ok(pipeline) => {
                    let adapter = pipeline.device_info().adapter_name.clone();
                    *context = Context::Gpu(Box::new(pipeline));
                    RenderBackend::Gpu { adapter }
                }
                Err(e) => {
                    warn!(error = %e, "GPU filter pipeline unavailable, using CPU renderer");
                    *context = Context::Cpu;
                    RenderBackend::Cpu
                }
            },
        };

        info!(backend = %backend, "Filter applier ready");
        Ok(backend)
    }

    /// Whether `setup` has bound a context
    pub async fn is_ready(&self) -> bool {
        !matches!(*self.context.lock().await, Context::Unbound)
    }

    /// Render `filter_type` over `image` into a new image
    pub async fn apply(
        &self,
        image: &Arc<RgbaImage>,
        filter_type: FilterType,
    ) -> Result<RgbaImage, FilterError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FilterError::InvalidImage(format!("{}x{}", width, height)));
        }

        let filter = self.catalog.get_filter(filter_type);

        {
            let mut context = self.context.lock().await;
            match &mut *context {
                Context::Unbound => return Err(FilterError::NotInitialized),
                Context::Cpu => {}
                Context::Gpu(pipeline) => match pipeline.apply(image, &filter).await {
                    Ok(output) => {
                        debug!(filter = %filter_type, width, height, "Rendered on GPU");
                        return Ok(output);
                    }
                    Err(e) => {
                        warn!(filter = %filter_type, error = %e, "GPU render failed, using CPU renderer");
                    }
                },
            }
        }

        let image = Arc::clone(image);
        let output = tokio::task::spawn_blocking(move || cpu::apply(&image, &filter))
            .await
            .map_err(|e| FilterError::RenderFailed(e.to_string()))?;
        debug!(filter = %filter_type, width, height, "Rendered on CPU");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_fn(16, 12, |x, y| {
            Rgba([(x * 16) as u8, (y * 20) as u8, 60, 255])
        }))
    }

    #[tokio::test]
    async fn test_apply_before_setup_is_rejected() {
        let applier = FilterApplier::new();
        let result = applier.apply(&sample(), FilterType::Sepia).await;
        assert!(matches!(result, Err(FilterError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_cpu_mode_renders_without_touching_source() {
        let applier = FilterApplier::new();
        assert_eq!(
            applier.setup(RenderMode::Cpu).await.unwrap(),
            RenderBackend::Cpu
        );

        let original = sample();
        let before = (*original).clone();
        let inverted = applier.apply(&original, FilterType::Invert).await.unwrap();

        assert_eq!(*original, before);
        assert_ne!(inverted, before);
        assert_eq!(
            applier.apply(&original, FilterType::None).await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_setup_is_sticky() {
        let applier = FilterApplier::new();
        applier.setup(RenderMode::Cpu).await.unwrap();
        // Already bound, so no GPU probing happens
        assert_eq!(
            applier.setup(RenderMode::Gpu).await.unwrap(),
            RenderBackend::Cpu
        );
        assert!(applier.is_ready().await);
    }

    #[tokio::test]
    async fn test_empty_image_is_invalid() {
        let applier = FilterApplier::new();
        applier.setup(RenderMode::Cpu).await.unwrap();
        let empty = Arc::new(RgbaImage::new(0, 0));
        assert!(matches!(
            applier.apply(&empty, FilterType::Grayscale).await,
            Err(FilterError::InvalidImage(_))
        ));
    }
}
