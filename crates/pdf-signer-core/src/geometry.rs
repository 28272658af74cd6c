//! Conversion between raster space and PDF point space.
//!
//! # Coordinate Systems
//!
//! The rendered page raster uses a **top-left origin**:
//! - (0, 0) is the top-left pixel
//! - Y increases downward
//! - units are pixels at the render scale
//!
//! PDF content uses a **bottom-left origin**:
//! - (0, 0) is the bottom-left corner of the page
//! - Y increases upward
//! - units are points (1/72 inch)
//!
//! Stored overlay positions are "top-down points": scaled into point units
//! but still measured from the top edge. The Y flip happens only when drawing,
//! see [`text_origin_y`] and [`image_origin_y`].

use serde::{Deserialize, Serialize};

/// A 2D point in either coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width/height pair in either coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Scale both dimensions by the same factor.
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// Axis-aligned rectangle, origin at its top-left in raster space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn right(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin.x && p.x <= self.right() && p.y >= self.origin.y && p.y <= self.bottom()
    }
}

/// Ratio `num / den`, or 1.0 when either side is degenerate.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || num == 0.0 || !num.is_finite() || !den.is_finite() {
        1.0
    } else {
        num / den
    }
}

/// Raster point to top-down PDF points.
pub fn to_pdf(rx: f64, ry: f64, disp_w: f64, disp_h: f64, pdf_w: f64, pdf_h: f64) -> (f64, f64) {
    (rx * ratio(pdf_w, disp_w), ry * ratio(pdf_h, disp_h))
}

/// Top-down PDF points to a raster point.
pub fn to_display(px: f64, py: f64, disp_w: f64, disp_h: f64, pdf_w: f64, pdf_h: f64) -> (f64, f64) {
    (px * ratio(disp_w, pdf_w), py * ratio(disp_h, pdf_h))
}

/// Whole-pixel size of a page rasterized at `render_scale`. The scaled
/// bounds are rounded outward, ignoring slivers under 0.001 px, as the
/// renderer does.
pub fn raster_size(pdf: Size, render_scale: f64) -> Size {
    let scaled = pdf.scaled(render_scale);
    Size::new((scaled.width - 0.001).ceil(), (scaled.height - 0.001).ceil())
}

/// Maps between one page's raster and its point dimensions.
///
/// Built from four scalars: display width/height (pixels) and PDF page
/// width/height (points). A mapper with any zero dimension degrades to an
/// identity mapping on that axis instead of dividing by zero, since a page
/// may not be rendered yet when positions are restored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    pub display: Size,
    pub pdf: Size,
}

impl CoordinateMapper {
    pub const fn new(display: Size, pdf: Size) -> Self {
        Self { display, pdf }
    }

    /// Mapper for a page rendered at `render_scale` pixels per point.
    pub fn for_render_scale(pdf: Size, render_scale: f64) -> Self {
        Self::new(raster_size(pdf, render_scale), pdf)
    }

    /// Mapper that leaves coordinates untouched.
    pub const fn identity() -> Self {
        Self::new(Size::new(0.0, 0.0), Size::new(0.0, 0.0))
    }

    /// Point units per raster pixel on each axis (the stored `scale_x`/`scale_y`).
    pub fn pdf_per_pixel(&self) -> (f64, f64) {
        (
            ratio(self.pdf.width, self.display.width),
            ratio(self.pdf.height, self.display.height),
        )
    }

    pub fn to_pdf(&self, p: Point) -> Point {
        let (x, y) = to_pdf(
            p.x,
            p.y,
            self.display.width,
            self.display.height,
            self.pdf.width,
            self.pdf.height,
        );
        Point::new(x, y)
    }

    pub fn to_display(&self, p: Point) -> Point {
        let (x, y) = to_display(
            p.x,
            p.y,
            self.display.width,
            self.display.height,
            self.pdf.width,
            self.pdf.height,
        );
        Point::new(x, y)
    }

    pub fn size_to_pdf(&self, s: Size) -> Size {
        let p = self.to_pdf(Point::new(s.width, s.height));
        Size::new(p.x, p.y)
    }
}

/// Y of the text origin in PDF space for a box whose top-down position is `pdf_y`.
///
/// Subtracting the font size anchors the first line near the box's visual top.
/// This reproduces the established placement; it is not a baseline computation.
pub fn text_origin_y(page_height: f64, pdf_y: f64, font_size: f64) -> f64 {
    page_height - pdf_y - font_size
}

/// Y of an image's lower-left corner in PDF space.
pub fn image_origin_y(page_height: f64, pdf_y: f64, image_height: f64) -> f64 {
    page_height - pdf_y - image_height
}

/// Largest rectangle of the image's aspect ratio that fits `bounds`,
/// anchored at the bounds' lower-left corner. Returns `(x, y, w, h)`.
pub fn fit_preserving_aspect(
    x: f64,
    y: f64,
    bounds: Size,
    image_width: f64,
    image_height: f64,
) -> (f64, f64, f64, f64) {
    if image_width <= 0.0 || image_height <= 0.0 || bounds.width <= 0.0 || bounds.height <= 0.0 {
        return (x, y, bounds.width, bounds.height);
    }
    let scale = (bounds.width / image_width).min(bounds.height / image_height);
    (x, y, image_width * scale, image_height * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6
    }

    #[test]
    fn test_to_pdf_scales_by_ratio() {
        let (x, y) = to_pdf(200.0, 100.0, 1224.0, 1584.0, 612.0, 792.0);
        assert!((x - 100.0).abs() < EPS);
        assert!((y - 50.0).abs() < EPS);
    }

    #[test]
    fn test_round_trip() {
        let dims = [
            (1224.0, 1584.0, 612.0, 792.0),
            (800.0, 600.0, 595.0, 842.0),
            (1.0, 3.0, 1000.0, 0.5),
        ];
        let points = [(0.0, 0.0), (13.7, 421.25), (1223.9, 1583.1), (5.0, 2.0)];

        for &(dw, dh, pw, ph) in &dims {
            for &(x, y) in &points {
                let (px, py) = to_pdf(x, y, dw, dh, pw, ph);
                let back = to_display(px, py, dw, dh, pw, ph);
                assert!(close(back, (x, y)), "round trip failed for {x},{y} with {dw}x{dh}/{pw}x{ph}");
            }
        }
    }

    #[test]
    fn test_degenerate_dimensions_are_identity() {
        assert_eq!(to_pdf(10.0, 20.0, 0.0, 0.0, 612.0, 792.0), (10.0, 20.0));
        assert_eq!(to_pdf(10.0, 20.0, 1224.0, 1584.0, 0.0, 0.0), (10.0, 20.0));
        assert_eq!(to_display(10.0, 20.0, 0.0, 1584.0, 612.0, 792.0), (10.0, 40.0));
        assert_eq!(to_display(10.0, 20.0, 1224.0, 1584.0, 612.0, 0.0), (20.0, 20.0));

        let mapper = CoordinateMapper::identity();
        assert_eq!(mapper.to_pdf(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
        assert_eq!(mapper.pdf_per_pixel(), (1.0, 1.0));
    }

    #[test]
    fn test_text_origin_example() {
        // 612x792 page, box at (100, 50) with 12pt text lands at (100, 730)
        assert!((text_origin_y(792.0, 50.0, 12.0) - 730.0).abs() < EPS);
    }

    #[test]
    fn test_raster_size_rounds_outward() {
        assert_eq!(raster_size(Size::new(612.0, 792.0), 2.0), Size::new(1224.0, 1584.0));
        assert_eq!(raster_size(Size::new(419.53, 595.28), 2.0), Size::new(840.0, 1191.0));
        assert_eq!(raster_size(Size::new(100.0002, 50.0), 1.0), Size::new(100.0, 50.0));
    }

    #[test]
    fn test_mapper_for_render_scale() {
        let mapper = CoordinateMapper::for_render_scale(Size::new(612.0, 792.0), 2.0);
        assert_eq!(mapper.display, Size::new(1224.0, 1584.0));
        assert_eq!(mapper.to_pdf(Point::new(200.0, 100.0)), Point::new(100.0, 50.0));
        assert_eq!(mapper.pdf_per_pixel(), (0.5, 0.5));
    }

    #[test]
    fn test_fit_preserving_aspect() {
        let (_, _, w, h) = fit_preserving_aspect(0.0, 0.0, Size::new(100.0, 100.0), 200.0, 50.0);
        assert!((w - 100.0).abs() < EPS);
        assert!((h - 25.0).abs() < EPS);
    }

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(Point::new(10.0, 10.0), Size::new(5.0, 5.0));
        assert!(rect.contains(Point::new(12.0, 15.0)));
        assert!(!rect.contains(Point::new(16.0, 12.0)));
    }
}
