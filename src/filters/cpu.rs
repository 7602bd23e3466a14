// SPDX-License-Identifier: GPL-3.0-only

//! CPU filter renderer (fallback when no GPU adapter is available)
//!
//! Mirrors `filters.wgsl` pixel for pixel: geometric filters sample with
//! bilinear filtering and clamp-to-edge addressing, neighborhood filters read
//! clamped texels directly. Output channels are rounded the same way
//! `pack4x8unorm` rounds them.

use super::catalog::{Filter, Point};
use image::RgbaImage;

/// Rec. 709 luminance weights
const LUMINANCE: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// Sepia color matrix rows
const SEPIA: [[f32; 3]; 3] = [
    [0.3588, 0.7044, 0.1368],
    [0.2990, 0.5870, 0.1140],
    [0.2392, 0.4696, 0.0912],
];

type Rgba = [f32; 4];

/// Render `filter` over `image`, producing a new image of the same size
pub fn apply(image: &RgbaImage, filter: &Filter) -> RgbaImage {
    if filter.is_passthrough() {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let source = Texture::new(image);
    let mut output = RgbaImage::new(width, height);

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let color = shade(&source, filter, x, y);
        pixel.0 = pack(color);
    }

    output
}

/// Compute one output pixel
fn shade(tex: &Texture<'_>, filter: &Filter, x: u32, y: u32) -> Rgba {
    let uv = tex.uv(x, y);
    let x = x as i64;
    let y = y as i64;

    match *filter {
        Filter::Passthrough => tex.texel(x, y),
        Filter::Grayscale => {
            let c = tex.texel(x, y);
            let lum = luminance(&c);
            [lum, lum, lum, c[3]]
        }
        Filter::Sepia { intensity } => {
            let c = tex.texel(x, y);
            let mut out = [0.0, 0.0, 0.0, c[3]];
            for (channel, row) in SEPIA.iter().enumerate() {
                let toned = row[0] * c[0] + row[1] * c[1] + row[2] * c[2];
                out[channel] = intensity * toned + (1.0 - intensity) * c[channel];
            }
            out
        }
        Filter::ColorInvert => {
            let c = tex.texel(x, y);
            [1.0 - c[0], 1.0 - c[1], 1.0 - c[2], c[3]]
        }
        Filter::Sketch { edge_strength } => {
            let c = tex.texel(x, y);
            let value = 1.0 - sobel_magnitude(tex, x, y) * edge_strength;
            [value, value, value, c[3]]
        }
        Filter::Toon {
            threshold,
            quantization_levels,
        } => {
            let c = tex.texel(x, y);
            let magnitude = sobel_magnitude(tex, x, y);
            let keep = 1.0 - step(threshold, magnitude);
            let q = |v: f32| posterize(v, quantization_levels) * keep;
            [q(c[0]), q(c[1]), q(c[2]), c[3]]
        }
        Filter::Pixelation { pixel_size } => {
            let (w, h) = tex.size();
            let dx = pixel_size / w;
            let dy = pixel_size / h;
            let block = [
                dx * (uv[0] / dx).floor() + 0.5 / w,
                dy * (uv[1] / dy).floor() + 0.5 / h,
            ];
            tex.sample(block)
        }
        Filter::Crosshatch {
            spacing,
            line_width,
        } => {
            let lum = luminance(&tex.texel(x, y));
            let (u, v) = (uv[0], uv[1]);
            let half = spacing / 2.0;
            let hatched = (lum < 1.00 && glsl_mod(u + v, spacing) <= line_width)
                || (lum < 0.75 && glsl_mod(u - v, spacing) <= line_width)
                || (lum < 0.50 && glsl_mod(u + v - half, spacing) <= line_width)
                || (lum < 0.30 && glsl_mod(u - v - half, spacing) <= line_width);
            if hatched {
                [0.0, 0.0, 0.0, 1.0]
            } else {
                [1.0, 1.0, 1.0, 1.0]
            }
        }
        Filter::BulgeDistortion {
            radius,
            scale,
            center,
        } => {
            let aspect = tex.aspect();
            let corrected = [uv[0], (uv[1] - center.y) * aspect + center.y];
            let dist = distance(corrected, center);
            let mut coord = uv;
            if dist < radius {
                let percent = 1.0 - ((radius - dist) / radius) * scale;
                let percent = percent * percent;
                coord = [
                    (uv[0] - center.x) * percent + center.x,
                    (uv[1] - center.y) * percent + center.y,
                ];
            }
            tex.sample(coord)
        }
        Filter::Swirl {
            radius,
            angle,
            center,
        } => {
            let mut offset = [uv[0] - center.x, uv[1] - center.y];
            let dist = (offset[0] * offset[0] + offset[1] * offset[1]).sqrt();
            if dist < radius {
                let percent = (radius - dist) / radius;
                let theta = percent * percent * angle * 8.0;
                let (s, c) = theta.sin_cos();
                offset = [
                    offset[0] * c - offset[1] * s,
                    offset[0] * s + offset[1] * c,
                ];
            }
            tex.sample([offset[0] + center.x, offset[1] + center.y])
        }
        Filter::SphereRefraction {
            radius,
            refractive_index,
            center,
        } => {
            let aspect = tex.aspect();
            let corrected = [uv[0], uv[1] * aspect + 0.5 - 0.5 * aspect];
            let dist = distance(corrected, center);
            if dist > radius || radius <= 0.0 {
                return [0.0; 4];
            }
            let normalized = dist / radius;
            let depth = radius * (1.0 - normalized * normalized).max(0.0).sqrt();
            let normal = normalize([corrected[0] - center.x, corrected[1] - center.y, depth]);
            let refracted = refract([0.0, 0.0, -1.0], normal, refractive_index);
            tex.sample([(refracted[0] + 1.0) * 0.5, (refracted[1] + 1.0) * 0.5])
        }
        Filter::Emboss { intensity } => {
            let kernel = [
                [-2.0 * intensity, -intensity, 0.0],
                [-intensity, 1.0, intensity],
                [0.0, intensity, 2.0 * intensity],
            ];
            let mut sum = [0.0f32; 3];
            for (row, weights) in kernel.iter().enumerate() {
                for (col, weight) in weights.iter().enumerate() {
                    let c = tex.texel(x + col as i64 - 1, y + row as i64 - 1);
                    for channel in 0..3 {
                        sum[channel] += c[channel] * weight;
                    }
                }
            }
            [sum[0], sum[1], sum[2], tex.texel(x, y)[3]]
        }
        Filter::Posterize { color_levels } => {
            let c = tex.texel(x, y);
            [
                posterize(c[0], color_levels),
                posterize(c[1], color_levels),
                posterize(c[2], color_levels),
                c[3],
            ]
        }
    }
}

/// Read-only view of the source image with shader-style addressing
struct Texture<'a> {
    image: &'a RgbaImage,
    width: u32,
    height: u32,
}

impl<'a> Texture<'a> {
    fn new(image: &'a RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
        }
    }

    fn size(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }

    /// Height over width
    fn aspect(&self) -> f32 {
        self.height as f32 / self.width as f32
    }

    /// Normalized coordinate of a pixel center
    fn uv(&self, x: u32, y: u32) -> [f32; 2] {
        [
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        ]
    }

    /// Texel fetch with clamp-to-edge addressing
    fn texel(&self, x: i64, y: i64) -> Rgba {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        let p = self.image.get_pixel(x, y).0;
        [
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
            p[3] as f32 / 255.0,
        ]
    }

    /// Bilinear sample at a normalized coordinate
    fn sample(&self, uv: [f32; 2]) -> Rgba {
        if !uv[0].is_finite() || !uv[1].is_finite() {
            return [0.0; 4];
        }
        let fx = uv[0] * self.width as f32 - 0.5;
        let fy = uv[1] * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.texel(x0, y0);
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);

        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * tx;
            let bottom = c[i] + (d[i] - c[i]) * tx;
            out[i] = top + (bottom - top) * ty;
        }
        out
    }
}

fn sobel_magnitude(tex: &Texture<'_>, x: i64, y: i64) -> f32 {
    let l = |dx: i64, dy: i64| luminance(&tex.texel(x + dx, y + dy));
    let (tl, t, tr) = (l(-1, -1), l(0, -1), l(1, -1));
    let (ml, mr) = (l(-1, 0), l(1, 0));
    let (bl, b, br) = (l(-1, 1), l(0, 1), l(1, 1));

    let h = -tl - 2.0 * ml - bl + tr + 2.0 * mr + br;
    let v = -bl - 2.0 * b - br + tl + 2.0 * t + tr;
    (h * h + v * v).sqrt()
}

fn luminance(c: &Rgba) -> f32 {
    c[0] * LUMINANCE[0] + c[1] * LUMINANCE[1] + c[2] * LUMINANCE[2]
}

fn posterize(value: f32, levels: f32) -> f32 {
    (value * levels + 0.5).floor() / levels
}

/// GLSL `step`: 0.0 below the edge, 1.0 at or above it
fn step(edge: f32, x: f32) -> f32 {
    if x < edge { 0.0 } else { 1.0 }
}

/// GLSL `mod`, which floors (unlike `%`)
fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

fn distance(a: [f32; 2], b: Point) -> f32 {
    let dx = a[0] - b.x;
    let dy = a[1] - b.y;
    (dx * dx + dy * dy).sqrt()
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        return [0.0, 0.0, 1.0];
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

/// GLSL `refract` for an incident vector `i` and surface normal `n`
fn refract(i: [f32; 3], n: [f32; 3], eta: f32) -> [f32; 3] {
    let d = n[0] * i[0] + n[1] * i[1] + n[2] * i[2];
    let k = 1.0 - eta * eta * (1.0 - d * d);
    if k < 0.0 {
        return [0.0; 3];
    }
    let f = eta * d + k.sqrt();
    [
        eta * i[0] - f * n[0],
        eta * i[1] - f * n[1],
        eta * i[2] - f * n[2],
    ]
}

fn pack(c: Rgba) -> [u8; 4] {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(c[0]), q(c[1]), q(c[2]), q(c[3])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterCatalog, FilterType};
    use image::Rgba as Pixel;

    fn render(image: &RgbaImage, filter_type: FilterType) -> RgbaImage {
        apply(image, &FilterCatalog::new().get_filter(filter_type))
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Pixel([(x * 255 / width) as u8, (y * 255 / height) as u8, 128, 255])
        })
    }

    #[test]
    fn test_none_is_pixel_identical() {
        let image = gradient(17, 9);
        assert_eq!(render(&image, FilterType::None), image);
    }

    #[test]
    fn test_every_filter_preserves_dimensions() {
        let image = gradient(33, 20);
        for filter_type in FilterType::ALL {
            let out = render(&image, filter_type);
            assert_eq!(out.dimensions(), (33, 20), "{:?}", filter_type);
        }
    }

    #[test]
    fn test_grayscale_channels_equal() {
        let image = gradient(8, 8);
        let out = render(&image, FilterType::Grayscale);
        for p in out.pixels() {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
        }
        // 0.2125 * 1 + 0.7154 * 0 + 0.0721 * 0
        let red = RgbaImage::from_pixel(1, 1, Pixel([255, 0, 0, 255]));
        assert_eq!(render(&red, FilterType::Grayscale).get_pixel(0, 0)[0], 54);
    }

    #[test]
    fn test_invert_is_involution() {
        let image = gradient(12, 7);
        let once = render(&image, FilterType::Invert);
        assert_eq!(once.get_pixel(0, 0)[2], 127);
        assert_eq!(render(&once, FilterType::Invert), image);
    }

    #[test]
    fn test_sepia_white_tint() {
        let white = RgbaImage::from_pixel(2, 2, Pixel([255, 255, 255, 255]));
        let p = *render(&white, FilterType::Sepia).get_pixel(1, 1);
        assert_eq!(p.0, [255, 255, 204, 255]);
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let flat = RgbaImage::from_pixel(6, 6, Pixel([90, 140, 200, 255]));
        for p in render(&flat, FilterType::Sketch).pixels() {
            assert_eq!(p.0, [255, 255, 255, 255]);
        }
    }

    #[test]
    fn test_toon_outlines_hard_edge() {
        let image = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Pixel([0, 0, 0, 255])
            } else {
                Pixel([255, 255, 255, 255])
            }
        });
        let out = render(&image, FilterType::Toon);
        assert_eq!(out.get_pixel(5, 5).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(9, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_pixelate_fills_blocks() {
        let image = gradient(40, 40);
        let out = render(&image, FilterType::Pixelate);
        assert_eq!(out.get_pixel(0, 0), out.get_pixel(9, 9));
        assert_eq!(out.get_pixel(0, 0), image.get_pixel(0, 0));
        assert_eq!(out.get_pixel(10, 0), image.get_pixel(10, 0));
    }

    #[test]
    fn test_posterize_levels() {
        let image = RgbaImage::from_pixel(1, 1, Pixel([100, 0, 255, 255]));
        let out = render(&image, FilterType::Posterize);
        // floor(0.392 * 10 + 0.5) / 10 = 0.4
        assert_eq!(out.get_pixel(0, 0).0, [102, 0, 255, 255]);
    }

    #[test]
    fn test_sphere_outside_radius_is_transparent() {
        let image = gradient(64, 64);
        let out = render(&image, FilterType::Sphere);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_ne!(out.get_pixel(32, 32)[3], 0);
    }

    #[test]
    fn test_distortions_leave_corners_alone() {
        let image = gradient(64, 48);
        for filter_type in [FilterType::Bulge, FilterType::Swirl] {
            let out = render(&image, filter_type);
            assert_eq!(out.get_pixel(0, 0), image.get_pixel(0, 0), "{:?}", filter_type);
            assert_eq!(out.get_pixel(63, 47), image.get_pixel(63, 47), "{:?}", filter_type);
        }
    }

    #[test]
    fn test_crosshatch_is_black_and_white() {
        let out = render(&gradient(30, 30), FilterType::Crosshatch);
        for p in out.pixels() {
            assert!(p.0 == [0, 0, 0, 255] || p.0 == [255, 255, 255, 255]);
        }
    }

    #[test]
    fn test_glsl_mod_floors_negative() {
        assert!((glsl_mod(-0.01, 0.03) - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_refract_total_internal_reflection() {
        assert_eq!(refract([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], 2.0), [0.0; 3]);
    }
}
