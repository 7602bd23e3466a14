// SPDX-License-Identifier: GPL-3.0-only

//! Photo filters
//!
//! - `catalog`: filter identifiers mapped to render parameters
//! - `applier`: renders a filter over an image on the bound rendering context
//! - `gpu`: wgpu compute pipeline running `filters.wgsl`
//! - `cpu`: reference renderer used when no GPU adapter is available

mod applier;
mod catalog;
pub mod cpu;
mod gpu;

pub use applier::{FilterApplier, RenderBackend, RenderMode};
pub use catalog::{Filter, FilterCatalog};
pub use gpu::{GpuFilterPipeline, FILTER_SHADER};

use serde::{Deserialize, Serialize};

/// Filters offered in the filter strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// No filter, the original capture
    #[default]
    None,
    /// Luminance-only black and white
    Grayscale,
    /// Brown sepia tone
    Sepia,
    /// Inverted colors
    Invert,
    /// Pencil sketch from Sobel edges
    Sketch,
    /// Cartoon shading with dark outlines
    Toon,
    /// Square mosaic blocks
    Pixelate,
    /// Luminance-driven hatching
    Crosshatch,
    /// Convex lens bulge
    Bulge,
    /// Swirl around the center
    Swirl,
    /// Glass sphere refraction
    Sphere,
    /// Embossed relief
    Emboss,
    /// Reduced color levels
    Posterize,
}

impl FilterType {
    /// Every filter, in filter-strip order
    pub const ALL: [FilterType; 13] = [
        FilterType::None,
        FilterType::Grayscale,
        FilterType::Sepia,
        FilterType::Invert,
        FilterType::Sketch,
        FilterType::Toon,
        FilterType::Pixelate,
        FilterType::Crosshatch,
        FilterType::Bulge,
        FilterType::Swirl,
        FilterType::Sphere,
        FilterType::Emboss,
        FilterType::Posterize,
    ];

    /// Label shown in the filter strip
    pub fn display_name(&self) -> &'static str {
        match self {
            FilterType::None => "NONE",
            FilterType::Grayscale => "GRAYSCALE",
            FilterType::Sepia => "SEPIA",
            FilterType::Invert => "INVERT",
            FilterType::Sketch => "SKETCH",
            FilterType::Toon => "TOON",
            FilterType::Pixelate => "PIXEL",
            FilterType::Crosshatch => "CROSSHATCH",
            FilterType::Bulge => "BULGE",
            FilterType::Swirl => "SWIRL",
            FilterType::Sphere => "SPHERE",
            FilterType::Emboss => "EMBOSS",
            FilterType::Posterize => "POSTER",
        }
    }

    /// Parse a filter from its label or variant name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|filter| {
            filter.display_name().eq_ignore_ascii_case(name)
                || format!("{:?}", filter).eq_ignore_ascii_case(name)
        })
    }

    /// Next filter in strip order (wraps around)
    pub fn next(&self) -> Self {
        let index = self.index();
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Previous filter in strip order (wraps around)
    pub fn previous(&self) -> Self {
        let index = self.index();
        Self::ALL[(index + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Position in `ALL`
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_label_and_variant() {
        assert_eq!(FilterType::from_name("poster"), Some(FilterType::Posterize));
        assert_eq!(FilterType::from_name("Posterize"), Some(FilterType::Posterize));
        assert_eq!(FilterType::from_name("PIXEL"), Some(FilterType::Pixelate));
        assert_eq!(FilterType::from_name("vaporwave"), None);
    }

    #[test]
    fn test_next_previous_wrap() {
        assert_eq!(FilterType::None.previous(), FilterType::Posterize);
        assert_eq!(FilterType::Posterize.next(), FilterType::None);
        for filter in FilterType::ALL {
            assert_eq!(filter.next().previous(), filter);
        }
    }
}
