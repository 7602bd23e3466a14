// SPDX-License-Identifier: GPL-3.0-only
//! GPU filter pipeline
//!
//! Uploads an RGBA image to a texture, runs `filters.wgsl` over it and reads
//! the packed result back from a storage buffer.

use super::catalog::Filter;
use crate::constants::gpu::WORKGROUP_SIZE;
use crate::gpu::{self, CachedDimensions, GpuDeviceInfo, wgpu};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info};

/// WGSL source of the filter compute shader
pub const FILTER_SHADER: &str = include_str!("filters.wgsl");

/// Filter parameters uniform
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FilterParams {
    width: u32,
    height: u32,
    filter_mode: u32,
    _padding: u32,
    params0: [f32; 4],
    params1: [f32; 4],
}

/// GPU filter pipeline for still images
pub struct GpuFilterPipeline {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: GpuDeviceInfo,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    // Cached resources for current dimensions
    cached_dims: CachedDimensions,
    input_texture: Option<wgpu::Texture>,
    output_buffer: Option<wgpu::Buffer>,
    staging_buffer: Option<wgpu::Buffer>,
}

impl GpuFilterPipeline {
    /// Create the device and compile the filter pipeline
    pub async fn new() -> Result<Self, String> {
        info!("Initializing GPU filter pipeline");

        let (device, queue, info) = gpu::create_compute_device("filter_pipeline_gpu").await?;

        info!(
            adapter_name = %info.adapter_name,
            adapter_backend = ?info.backend,
            software = info.software,
            "GPU device created for filter pipeline"
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("filter_compute_shader"),
            source: wgpu::ShaderSource::Wgsl(FILTER_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter_bind_group_layout"),
            entries: &[
                // Input texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Output storage buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniform buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("filter_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filter_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_uniform_buffer"),
            size: std::mem::size_of::<FilterParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            info,
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            cached_dims: CachedDimensions::default(),
            input_texture: None,
            output_buffer: None,
            staging_buffer: None,
        })
    }

    /// Adapter the pipeline runs on
    pub fn device_info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    /// Ensure resources are allocated for the given dimensions
    fn ensure_resources(&mut self, width: u32, height: u32) {
        if !self.cached_dims.needs_update(width, height) {
            return;
        }

        debug!(width, height, "Allocating filter pipeline resources");

        let buffer_size = width as u64 * height as u64 * 4;

        self.input_texture = Some(self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("filter_input_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        }));

        self.output_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_output_buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }));

        self.staging_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_staging_buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }));

        self.cached_dims.update(width, height);
    }

    /// Render `filter` over `image` on the GPU
    pub async fn apply(&mut self, image: &RgbaImage, filter: &Filter) -> Result<RgbaImage, String> {
        if filter.is_passthrough() {
            return Ok(image.clone());
        }

        let (width, height) = image.dimensions();
        let buffer_size = check_image_fits(width, height, &self.device.limits())?;

        self.ensure_resources(width, height);

        let input_texture = self
            .input_texture
            .as_ref()
            .ok_or("Input texture not allocated")?;
        let output_buffer = self
            .output_buffer
            .as_ref()
            .ok_or("Output buffer not allocated")?;
        let staging_buffer = self
            .staging_buffer
            .as_ref()
            .ok_or("Staging buffer not allocated")?;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: input_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let [params0, params1] = filter.shader_params();
        let params = FilterParams {
            width,
            height,
            filter_mode: filter.shader_mode(),
            _padding: 0,
            params0,
            params1,
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params));

        let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter_encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("filter_compute_pass"),
                timestamp_writes: None,
            });

            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, Some(&bind_group), &[]);
            compute_pass.dispatch_workgroups(
                gpu::compute_dispatch_size(width, WORKGROUP_SIZE),
                gpu::compute_dispatch_size(height, WORKGROUP_SIZE),
                1,
            );
        }

        encoder.copy_buffer_to_buffer(output_buffer, 0, staging_buffer, 0, buffer_size);

        self.queue.submit(std::iter::once(encoder.finish()));

        let output = gpu::read_buffer_async(&self.device, staging_buffer).await?;

        RgbaImage::from_raw(width, height, output)
            .ok_or_else(|| "GPU output has the wrong size".to_string())
    }
}

/// Output buffer size for a `width`x`height` image, or an error when the
/// device cannot hold it
fn check_image_fits(width: u32, height: u32, limits: &wgpu::Limits) -> Result<u64, String> {
    let max_dimension = limits.max_texture_dimension_2d;
    if width > max_dimension || height > max_dimension {
        return Err(format!(
            "{}x{} exceeds the GPU texture limit of {}",
            width, height, max_dimension
        ));
    }

    // The output buffer is bound whole as a storage buffer
    let buffer_size = width as u64 * height as u64 * 4;
    let max_buffer_size = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64);
    if buffer_size > max_buffer_size {
        return Err(format!(
            "{}x{} needs {} bytes, over the GPU buffer limit of {}",
            width, height, buffer_size, max_buffer_size
        ));
    }

    Ok(buffer_size)
}
