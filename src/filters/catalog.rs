// SPDX-License-Identifier: GPL-3.0-only

//! Filter catalog
//!
//! Maps each [`FilterType`] to a [`Filter`] carrying its render parameters.
//! Parameter defaults match the classic GPUImage filter set so the look of
//! each entry is familiar.

use super::FilterType;

/// Normalized texture coordinate (0.0..=1.0 on both axes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const CENTER: Point = Point { x: 0.5, y: 0.5 };
}

/// A ready-to-render filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    /// Returns the input unchanged
    Passthrough,
    Grayscale,
    Sepia {
        /// Blend between original (0.0) and full sepia matrix (1.0)
        intensity: f32,
    },
    ColorInvert,
    Sketch {
        edge_strength: f32,
    },
    Toon {
        /// Edge magnitude above which a pixel is outlined
        threshold: f32,
        /// Color levels per channel
        quantization_levels: f32,
    },
    Pixelation {
        /// Block size in pixels
        pixel_size: f32,
    },
    Crosshatch {
        /// Distance between hatch lines (normalized)
        spacing: f32,
        line_width: f32,
    },
    BulgeDistortion {
        radius: f32,
        /// -1.0..=1.0, positive bulges outward
        scale: f32,
        center: Point,
    },
    Swirl {
        radius: f32,
        angle: f32,
        center: Point,
    },
    SphereRefraction {
        radius: f32,
        refractive_index: f32,
        center: Point,
    },
    Emboss {
        intensity: f32,
    },
    Posterize {
        color_levels: f32,
    },
}

impl Filter {
    /// Identifier this filter was built for
    pub fn filter_type(&self) -> FilterType {
        match self {
            Filter::Passthrough => FilterType::None,
            Filter::Grayscale => FilterType::Grayscale,
            Filter::Sepia { .. } => FilterType::Sepia,
            Filter::ColorInvert => FilterType::Invert,
            Filter::Sketch { .. } => FilterType::Sketch,
            Filter::Toon { .. } => FilterType::Toon,
            Filter::Pixelation { .. } => FilterType::Pixelate,
            Filter::Crosshatch { .. } => FilterType::Crosshatch,
            Filter::BulgeDistortion { .. } => FilterType::Bulge,
            Filter::Swirl { .. } => FilterType::Swirl,
            Filter::SphereRefraction { .. } => FilterType::Sphere,
            Filter::Emboss { .. } => FilterType::Emboss,
            Filter::Posterize { .. } => FilterType::Posterize,
        }
    }

    /// Whether rendering leaves every pixel untouched
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Filter::Passthrough)
    }

    /// Mode selector for `filters.wgsl`
    pub fn shader_mode(&self) -> u32 {
        match self {
            Filter::Passthrough => 0,
            Filter::Grayscale => 1,
            Filter::Sepia { .. } => 2,
            Filter::ColorInvert => 3,
            Filter::Sketch { .. } => 4,
            Filter::Toon { .. } => 5,
            Filter::Pixelation { .. } => 6,
            Filter::Crosshatch { .. } => 7,
            Filter::BulgeDistortion { .. } => 8,
            Filter::Swirl { .. } => 9,
            Filter::SphereRefraction { .. } => 10,
            Filter::Emboss { .. } => 11,
            Filter::Posterize { .. } => 12,
        }
    }

    /// Parameters packed into the shader's two `vec4<f32>` slots
    pub fn shader_params(&self) -> [[f32; 4]; 2] {
        match *self {
            Filter::Passthrough | Filter::Grayscale | Filter::ColorInvert => [[0.0; 4]; 2],
            Filter::Sepia { intensity } => [[intensity, 0.0, 0.0, 0.0], [0.0; 4]],
            Filter::Sketch { edge_strength } => [[edge_strength, 0.0, 0.0, 0.0], [0.0; 4]],
            Filter::Toon {
                threshold,
                quantization_levels,
            } => [[threshold, quantization_levels, 0.0, 0.0], [0.0; 4]],
            Filter::Pixelation { pixel_size } => [[pixel_size, 0.0, 0.0, 0.0], [0.0; 4]],
            Filter::Crosshatch {
                spacing,
                line_width,
            } => [[spacing, line_width, 0.0, 0.0], [0.0; 4]],
            Filter::BulgeDistortion {
                radius,
                scale,
                center,
            } => [[radius, scale, 0.0, 0.0], [center.x, center.y, 0.0, 0.0]],
            Filter::Swirl {
                radius,
                angle,
                center,
            } => [[radius, angle, 0.0, 0.0], [center.x, center.y, 0.0, 0.0]],
            Filter::SphereRefraction {
                radius,
                refractive_index,
                center,
            } => [
                [radius, refractive_index, 0.0, 0.0],
                [center.x, center.y, 0.0, 0.0],
            ],
            Filter::Emboss { intensity } => [[intensity, 0.0, 0.0, 0.0], [0.0; 4]],
            Filter::Posterize { color_levels } => [[color_levels, 0.0, 0.0, 0.0], [0.0; 4]],
        }
    }
}

/// Look-up table from filter identifiers to filters
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCatalog;

impl FilterCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Filters in display order
    pub fn available_filters(&self) -> &'static [FilterType] {
        &FilterType::ALL
    }

    /// Build the filter for `filter_type` with its default parameters
    pub fn get_filter(&self, filter_type: FilterType) -> Filter {
        match filter_type {
            FilterType::None => Filter::Passthrough,
            FilterType::Grayscale => Filter::Grayscale,
            FilterType::Sepia => Filter::Sepia { intensity: 1.0 },
            FilterType::Invert => Filter::ColorInvert,
            FilterType::Sketch => Filter::Sketch { edge_strength: 1.0 },
            FilterType::Toon => Filter::Toon {
                threshold: 0.2,
                quantization_levels: 10.0,
            },
            FilterType::Pixelate => Filter::Pixelation { pixel_size: 10.0 },
            FilterType::Crosshatch => Filter::Crosshatch {
                spacing: 0.03,
                line_width: 0.003,
            },
            FilterType::Bulge => Filter::BulgeDistortion {
                radius: 0.25,
                scale: 0.5,
                center: Point::CENTER,
            },
            FilterType::Swirl => Filter::Swirl {
                radius: 0.5,
                angle: 1.0,
                center: Point::CENTER,
            },
            FilterType::Sphere => Filter::SphereRefraction {
                radius: 0.25,
                refractive_index: 0.71,
                center: Point::CENTER,
            },
            FilterType::Emboss => Filter::Emboss { intensity: 1.0 },
            FilterType::Posterize => Filter::Posterize { color_levels: 10.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_identifier_maps_to_its_own_filter() {
        let catalog = FilterCatalog::new();
        let mut modes = HashSet::new();

        for &filter_type in catalog.available_filters() {
            let filter = catalog.get_filter(filter_type);
            assert_eq!(filter.filter_type(), filter_type);
            assert!(
                modes.insert(filter.shader_mode()),
                "{:?} shares a shader mode",
                filter_type
            );
        }

        assert_eq!(modes.len(), FilterType::ALL.len());
    }

    #[test]
    fn test_only_none_is_passthrough() {
        let catalog = FilterCatalog::new();
        for filter_type in FilterType::ALL {
            assert_eq!(
                catalog.get_filter(filter_type).is_passthrough(),
                filter_type == FilterType::None
            );
        }
    }

    #[test]
    fn test_available_filters_starts_with_none() {
        let filters = FilterCatalog::new().available_filters();
        assert_eq!(filters.first(), Some(&FilterType::None));
        assert_eq!(filters.len(), 13);
    }

    #[test]
    fn test_distortion_params_carry_center() {
        let filter = FilterCatalog::new().get_filter(FilterType::Swirl);
        let [p0, p1] = filter.shader_params();
        assert_eq!(p0[0], 0.5);
        assert_eq!(p0[1], 1.0);
        assert_eq!((p1[0], p1[1]), (0.5, 0.5));
    }
}
