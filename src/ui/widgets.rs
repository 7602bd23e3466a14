// SPDX-License-Identifier: GPL-3.0-only

//! Terminal widgets
//!
//! Images are drawn with Unicode half-block characters: each cell shows two
//! vertical pixels, the upper one as foreground and the lower one as
//! background.

use crate::filters::FilterType;
use image::RgbaImage;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};

/// Renders an image scaled to fit, keeping its aspect ratio
pub struct ImageWidget<'a> {
    pub image: Option<&'a RgbaImage>,
    /// Shown while there is no image
    pub placeholder: &'a str,
    /// Flip horizontally (selfie-style preview)
    pub mirror: bool,
}

impl Widget for ImageWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = self.image.filter(|i| i.width() > 0 && i.height() > 0) else {
            render_centered(self.placeholder, area, buf, Style::default());
            return;
        };

        let (display_width, display_height) = fit(image.width(), image.height(), area);
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = image.width() as f64 / display_width as f64;
        let y_scale = image.height() as f64 / (display_height as f64 * 2.0);

        for ty in 0..display_height {
            for tx in 0..display_width {
                let mut src_x = (tx as f64 * x_scale) as u32;
                if self.mirror {
                    src_x = image.width().saturating_sub(1).saturating_sub(src_x);
                }
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(sample(image, src_x, src_y_top));
                    cell.set_bg(sample(image, src_x, src_y_bottom));
                }
            }
        }
    }
}

/// Display size in cells for an image inside `area`
fn fit(width: u32, height: u32, area: Rect) -> (u16, u16) {
    let aspect = width as f64 / height as f64;
    let term_width = area.width as f64;
    // Two pixel rows per cell
    let term_height = area.height as f64 * 2.0;

    if term_width / term_height > aspect {
        let w = term_height * aspect;
        (w as u16, area.height)
    } else {
        let h = term_width / aspect;
        (area.width, (h / 2.0) as u16)
    }
}

fn sample(image: &RgbaImage, x: u32, y: u32) -> Color {
    let x = x.min(image.width() - 1);
    let y = y.min(image.height() - 1);
    let [r, g, b, a] = image.get_pixel(x, y).0;
    // Transparent pixels (outside a refracting sphere) show as black
    let blend = |c: u8| (c as u16 * a as u16 / 255) as u8;
    Color::Rgb(blend(r), blend(g), blend(b))
}

fn render_centered(text: &str, area: Rect, buf: &mut Buffer, style: Style) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let width = text.chars().count() as u16;
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height / 2;
    buf.set_stringn(x, y, text, area.width as usize, style);
}

/// One-line strip of filter names with the selection highlighted
///
/// Scrolls so the selected filter is always visible.
pub struct FilterStrip<'a> {
    pub filters: &'a [FilterType],
    pub selected: FilterType,
}

impl Widget for FilterStrip<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let labels: Vec<String> = self
            .filters
            .iter()
            .map(|f| format!(" {} ", f.display_name()))
            .collect();
        let selected = self
            .filters
            .iter()
            .position(|f| *f == self.selected)
            .unwrap_or(0);

        // First label such that the selected one still fits
        let mut first = 0;
        while first < selected {
            let used: usize = labels[first..=selected].iter().map(|l| l.chars().count() + 1).sum();
            if used <= area.width as usize {
                break;
            }
            first += 1;
        }

        let right = area.x + area.width;
        let mut x = area.x;
        for (index, label) in labels.iter().enumerate().skip(first) {
            if x >= right {
                break;
            }
            let style = if index == selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let (next_x, _) = buf.set_stringn(x, area.y, label, (right - x) as usize, style);
            x = next_x.saturating_add(1);
        }
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    pub message: &'a str,
    pub error: bool,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let background = if self.error { Color::Red } else { Color::DarkGray };
        let style = Style::default().fg(Color::White).bg(background);

        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(background);
            }
        }

        buf.set_stringn(area.x, area.y, self.message, area.width as usize, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_image_fills_width_and_keeps_aspect() {
        // 2:1 image in a 20x20 area: 20 cells wide, 10 pixel rows = 5 cells
        let image = RgbaImage::from_pixel(40, 20, Rgba([255, 0, 0, 255]));
        let area = Rect::new(0, 0, 20, 20);
        let mut buf = Buffer::empty(area);

        ImageWidget {
            image: Some(&image),
            placeholder: "",
            mirror: false,
        }
        .render(area, &mut buf);

        let drawn = (0..20).filter(|y| buf[(0, *y)].symbol() == "▀").count();
        assert_eq!(drawn, 5);
        assert_eq!(buf[(10, 10)].fg, Color::Rgb(255, 0, 0));
    }

    #[test]
    fn test_mirror_flips_columns() {
        let image = RgbaImage::from_fn(2, 2, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);

        ImageWidget {
            image: Some(&image),
            placeholder: "",
            mirror: true,
        }
        .render(area, &mut buf);

        assert_eq!(buf[(0, 0)].fg, Color::Rgb(0, 0, 255));
        assert_eq!(buf[(1, 0)].fg, Color::Rgb(255, 0, 0));
    }

    #[test]
    fn test_transparent_pixels_render_black() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 0]));
        assert_eq!(sample(&image, 0, 0), Color::Rgb(0, 0, 0));
    }

    #[test]
    fn test_placeholder_without_image() {
        let area = Rect::new(0, 0, 20, 3);
        let mut buf = Buffer::empty(area);

        ImageWidget {
            image: None,
            placeholder: "Waiting",
            mirror: false,
        }
        .render(area, &mut buf);

        assert!(row_text(&buf, 1).contains("Waiting"));
    }

    #[test]
    fn test_strip_scrolls_to_selection() {
        let area = Rect::new(0, 0, 24, 1);
        let mut buf = Buffer::empty(area);

        FilterStrip {
            filters: &FilterType::ALL,
            selected: FilterType::Posterize,
        }
        .render(area, &mut buf);

        let text = row_text(&buf, 0);
        assert!(text.contains("POSTER"));
        assert!(!text.contains("NONE"));
    }

    #[test]
    fn test_status_bar_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);

        StatusBar {
            message: "Photo saved",
            error: false,
        }
        .render(area, &mut buf);

        assert_eq!(row_text(&buf, 0), "Photo");
    }
}
