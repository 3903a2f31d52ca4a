//! External contour extraction, perimeter measurement and overlay rendering.

use image::{GrayImage, Rgba, RgbaImage, imageops};
use imageproc::contours::{self, BorderType};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::point::Point;
use log::{Level, debug};
use serde::{Deserialize, Serialize};

use hc_utils::{ContourSelection, MeasurementSettings, OverlayStyle, encode_png, timing_guard};

use crate::error::{MeasureError, Result};
use crate::postprocess::BinaryMask;

/// How the traced boundary is reduced before its length is taken.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContourApproximation {
    /// Measure the raw pixel chain.
    #[default]
    None,
    /// Closed Douglas-Peucker simplification with the given tolerance in pixels.
    DouglasPeucker { epsilon: f64 },
}

/// Settings for [`measure`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureConfig {
    pub selection: ContourSelection,
    pub approximation: ContourApproximation,
    pub overlay_style: OverlayStyle,
    pub overlay_color: [u8; 4],
}

impl Default for MeasureConfig {
    fn default() -> Self {
        MeasurementSettings::default().into()
    }
}

impl From<MeasurementSettings> for MeasureConfig {
    fn from(settings: MeasurementSettings) -> Self {
        let approximation = match settings.approximation_epsilon {
            Some(epsilon) if epsilon > 0.0 => ContourApproximation::DouglasPeucker { epsilon },
            _ => ContourApproximation::None,
        };
        Self {
            selection: settings.selection,
            approximation,
            overlay_style: settings.overlay_style,
            overlay_color: settings.overlay_color,
        }
    }
}

impl From<&MeasurementSettings> for MeasureConfig {
    fn from(settings: &MeasurementSettings) -> Self {
        (*settings).into()
    }
}

/// A closed boundary as an ordered chain of pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point<i32>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Perimeter of the closed polyline, including the segment back to the start.
    pub fn arc_length(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| distance(self.points[i], self.points[(i + 1) % n]))
            .sum()
    }

    /// Enclosed area by the shoelace formula.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        twice.abs() as f64 / 2.0
    }

    /// Mean of the boundary points.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self.points.iter().fold((0.0, 0.0), |(sx, sy), p| {
            (sx + f64::from(p.x), sy + f64::from(p.y))
        });
        Some((sx / n, sy / n))
    }

    /// Closed Douglas-Peucker simplification.
    ///
    /// The ring is split at the point farthest from the first one and each
    /// half is simplified as an open chain.
    pub fn simplify(&self, epsilon: f64) -> Contour {
        let n = self.points.len();
        if n <= 3 || epsilon <= 0.0 {
            return self.clone();
        }

        let first = self.points[0];
        let mut far = 0;
        let mut far_dist = 0.0;
        for (i, &p) in self.points.iter().enumerate() {
            let d = distance(first, p);
            if d > far_dist {
                far = i;
                far_dist = d;
            }
        }
        if far == 0 {
            return self.clone();
        }

        let head = &self.points[..=far];
        let mut tail: Vec<Point<i32>> = self.points[far..].to_vec();
        tail.push(first);

        let mut simplified = douglas_peucker(head, epsilon);
        simplified.pop();
        let mut rest = douglas_peucker(&tail, epsilon);
        rest.pop();
        simplified.extend(rest);
        Contour::new(simplified)
    }
}

/// Outcome of [`measure`] for one mask.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Perimeter of the selected contour, in pixels of the mask grid.
    pub circumference: f64,
    /// The contour that was measured, after approximation.
    pub contour: Contour,
    /// Number of external contours found in the mask.
    pub contour_count: usize,
    pub area: f64,
    /// PNG-encoded RGBA overlay at the mask's resolution.
    pub overlay_png: Vec<u8>,
}

/// Outermost boundaries of every foreground region.
///
/// Holes and anything nested inside a hole are skipped. Contours come back in
/// the order classic Suzuki-Abe implementations list external borders: the
/// most recently traced first, so the region whose border starts lowest in
/// raster order leads.
pub fn external_contours(mask: &BinaryMask) -> Vec<Contour> {
    // Border following only recognises an outer border when background lies to
    // its left, so regions touching column 0 need a blank frame around them.
    let image = mask.as_image();
    let mut framed = GrayImage::new(image.width() + 2, image.height() + 2);
    imageops::replace(&mut framed, image, 1, 1);

    let mut found: Vec<Contour> = contours::find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            Contour::new(
                c.points
                    .into_iter()
                    .map(|p| Point::new(p.x - 1, p.y - 1))
                    .collect(),
            )
        })
        .collect();
    found.reverse();
    found
}

/// Measure the head boundary in `mask` and render the overlay.
pub fn measure(mask: &BinaryMask, config: &MeasureConfig) -> Result<Measurement> {
    let _guard = timing_guard("hc_core::measure", Level::Debug);

    let mut found = external_contours(mask);
    let contour_count = found.len();
    let index = select(&found, config.selection).ok_or(MeasureError::NoContour {
        width: mask.width(),
        height: mask.height(),
    })?;
    let traced = found.swap_remove(index);

    let contour = match config.approximation {
        ContourApproximation::None => traced,
        ContourApproximation::DouglasPeucker { epsilon } => traced.simplify(epsilon),
    };
    let circumference = contour.arc_length();
    let area = contour.area();
    debug!(
        "measured contour {index} of {contour_count}: {} points, perimeter {circumference:.3}px",
        contour.len()
    );

    let overlay = render_overlay(mask, &contour, circumference, config);
    let overlay_png = encode_png(&overlay)?;

    Ok(Measurement {
        circumference,
        contour,
        contour_count,
        area,
        overlay_png,
    })
}

fn select(found: &[Contour], selection: ContourSelection) -> Option<usize> {
    if found.is_empty() {
        return None;
    }
    match selection {
        ContourSelection::First => Some(0),
        ContourSelection::LargestArea => {
            let mut best = 0;
            let mut best_area = found[0].area();
            for (i, contour) in found.iter().enumerate().skip(1) {
                let area = contour.area();
                if area > best_area {
                    best = i;
                    best_area = area;
                }
            }
            Some(best)
        }
    }
}

/// Draw the measured boundary on an opaque black canvas the size of the mask.
pub fn render_overlay(
    mask: &BinaryMask,
    contour: &Contour,
    circumference: f64,
    config: &MeasureConfig,
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(mask.width(), mask.height(), Rgba([0, 0, 0, 255]));
    let color = Rgba(config.overlay_color);
    let points = contour.points();

    match config.overlay_style {
        OverlayStyle::Contour => match points {
            [] => {}
            [only] => {
                if let (Ok(x), Ok(y)) = (u32::try_from(only.x), u32::try_from(only.y)) {
                    if x < canvas.width() && y < canvas.height() {
                        canvas.put_pixel(x, y, color);
                    }
                }
            }
            _ => {
                for (i, &start) in points.iter().enumerate() {
                    let end = points[(i + 1) % points.len()];
                    draw_line_segment_mut(
                        &mut canvas,
                        (start.x as f32, start.y as f32),
                        (end.x as f32, end.y as f32),
                        color,
                    );
                }
            }
        },
        OverlayStyle::Circle => {
            if let Some((cx, cy)) = contour.centroid() {
                let radius = (circumference / std::f64::consts::TAU).round().max(1.0) as i32;
                draw_hollow_circle_mut(
                    &mut canvas,
                    (cx.round() as i32, cy.round() as i32),
                    radius,
                    color,
                );
            }
        }
    }
    canvas
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    f64::from(b.x - a.x).hypot(f64::from(b.y - a.y))
}

/// Distance from `p` to the line through `a` and `b`; falls back to `|p - a|`
/// when the two coincide.
fn line_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = f64::from(b.x - a.x);
    let dy = f64::from(b.y - a.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return distance(p, a);
    }
    (dy * f64::from(p.x) - dx * f64::from(p.y) + f64::from(b.x) * f64::from(a.y)
        - f64::from(b.y) * f64::from(a.x))
    .abs()
        / len
}

/// Open-chain Douglas-Peucker; both endpoints are always kept.
fn douglas_peucker(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let d = line_distance(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                max_index = i;
            }
        }
        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use hc_utils::fixtures::{centered_disk_mask, disk_mask};
    use image::GrayImage;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use std::f64::consts::PI;

    fn mask(image: GrayImage) -> BinaryMask {
        BinaryMask::from_gray(image)
    }

    #[test]
    fn disk_perimeter_tracks_the_true_circumference() {
        let disk = mask(centered_disk_mask(256, 50));
        let expected = 2.0 * PI * 50.0;

        // Unsimplified 8-connected chains overshoot 2*pi*r by roughly 5.7%.
        let raw = measure(&disk, &MeasureConfig::default()).unwrap();
        assert_eq!(raw.contour_count, 1);
        assert_eq!(raw.contour.len(), 284);
        assert!(
            (raw.circumference - 332.0488).abs() < 0.01,
            "raw perimeter {}",
            raw.circumference
        );
        assert_eq!(raw.area, 7862.0);

        let config = MeasureConfig {
            approximation: ContourApproximation::DouglasPeucker { epsilon: 1.0 },
            ..Default::default()
        };
        let simplified = measure(&disk, &config).unwrap();
        assert!(simplified.contour.len() < raw.contour.len());
        assert!(
            (simplified.circumference - 314.9165).abs() < 0.05,
            "simplified perimeter {}",
            simplified.circumference
        );
        assert!((simplified.circumference - expected).abs() / expected < 0.005);
    }

    #[test]
    fn overlay_matches_mask_size() {
        let disk = mask(centered_disk_mask(256, 50));
        let result = measure(&disk, &MeasureConfig::default()).unwrap();
        let overlay = image::load_from_memory(&result.overlay_png).unwrap().to_rgba8();
        assert_eq!(overlay.dimensions(), (256, 256));
        assert!(overlay.pixels().any(|p| p.0 == [0, 255, 0, 255]));
        assert_eq!(overlay.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn empty_mask_has_no_contour() {
        let empty = mask(GrayImage::new(32, 32));
        let err = measure(&empty, &MeasureConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoContour);
        assert!(err.to_string().contains("32x32"));
    }

    fn disc_and_square(disc_y: i32, square_y: i32) -> BinaryMask {
        let mut image = disk_mask(128, 128, (64, disc_y), 30);
        draw_filled_rect_mut(&mut image, Rect::at(60, square_y).of_size(6, 6), image::Luma([255]));
        mask(image)
    }

    #[test]
    fn first_is_the_region_starting_lowest() {
        let largest = MeasureConfig {
            selection: ContourSelection::LargestArea,
            ..Default::default()
        };

        // Square above the disc: the disc's border is traced last, so it leads.
        let above = disc_and_square(90, 5);
        let contours = external_contours(&above);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[1].area(), 25.0);
        let first = measure(&above, &MeasureConfig::default()).unwrap();
        assert_eq!(first.contour_count, 2);
        assert_eq!(first.area, 2824.0);
        assert!((first.circumference - 197.823).abs() < 0.01);
        assert_eq!(measure(&above, &largest).unwrap().area, 2824.0);

        // Square below the disc: now the square leads.
        let below = disc_and_square(45, 110);
        let first = measure(&below, &MeasureConfig::default()).unwrap();
        assert_eq!(first.contour_count, 2);
        assert_eq!(first.area, 25.0);
        assert_eq!(first.circumference, 20.0);
        let picked = measure(&below, &largest).unwrap();
        assert_eq!(picked.area, 2824.0);
        assert!(picked.circumference > first.circumference);
    }

    #[test]
    fn regions_touching_the_border_are_measured() {
        for center in [(0, 32), (32, 0), (63, 32), (32, 63)] {
            let edge = mask(disk_mask(64, 64, center, 20));
            let result = measure(&edge, &MeasureConfig::default())
                .unwrap_or_else(|e| panic!("disc at {center:?}: {e}"));
            assert_eq!(result.contour_count, 1, "disc at {center:?}");
            assert_eq!(result.contour.len(), 96, "disc at {center:?}");
            assert_eq!(result.area, 628.0, "disc at {center:?}");
            assert!(
                (result.circumference - 105.941).abs() < 0.01,
                "disc at {center:?}: {}",
                result.circumference
            );
        }

        for center in [(0, 0), (63, 63)] {
            let corner = mask(disk_mask(64, 64, center, 20));
            let result = measure(&corner, &MeasureConfig::default()).unwrap();
            assert_eq!(result.contour_count, 1, "disc at {center:?}");
            assert_eq!(result.contour.len(), 68, "disc at {center:?}");
            assert_eq!(result.area, 314.0, "disc at {center:?}");
            assert!((result.circumference - 72.971).abs() < 0.01);
        }

        // Contour points stay in mask coordinates.
        let left = external_contours(&mask(disk_mask(64, 64, (0, 32), 20)));
        assert!(left[0].points().iter().any(|p| p.x == 0));
        assert!(left[0].points().iter().all(|p| p.x >= 0 && p.y >= 0 && p.x < 64 && p.y < 64));
    }

    #[test]
    fn full_foreground_traces_the_frame() {
        let full = mask(GrayImage::from_pixel(16, 16, image::Luma([255])));
        let result = measure(&full, &MeasureConfig::default()).unwrap();
        assert_eq!(result.contour_count, 1);
        assert_eq!(result.circumference, 60.0);
        assert_eq!(result.area, 225.0);
    }

    #[test]
    fn holes_are_not_external_contours() {
        let mut image = centered_disk_mask(128, 40);
        draw_filled_rect_mut(&mut image, Rect::at(54, 54).of_size(20, 20), image::Luma([0]));
        let ring = mask(image);

        let contours = external_contours(&ring);
        assert_eq!(contours.len(), 1);
        let result = measure(&ring, &MeasureConfig::default()).unwrap();
        assert!((result.circumference - 266.108).abs() < 0.01);
        assert_eq!(result.area, 5030.0);
    }

    #[test]
    fn circle_overlay_draws_equivalent_circle() {
        let disk = mask(centered_disk_mask(128, 30));
        let config = MeasureConfig {
            overlay_style: OverlayStyle::Circle,
            overlay_color: [255, 0, 0, 255],
            ..Default::default()
        };
        let result = measure(&disk, &config).unwrap();
        let overlay = image::load_from_memory(&result.overlay_png).unwrap().to_rgba8();
        assert_eq!(overlay.dimensions(), (128, 128));
        assert_eq!(overlay.get_pixel(64, 64).0, [0, 0, 0, 255]);
        assert!(overlay.pixels().any(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn square_geometry_is_exact() {
        let square = Contour::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ]);
        assert_eq!(square.arc_length(), 40.0);
        assert_eq!(square.area(), 100.0);
        assert_eq!(square.centroid(), Some((5.0, 5.0)));
        assert_eq!(Contour::new(vec![Point::new(3, 3)]).arc_length(), 0.0);
    }

    #[test]
    fn simplify_drops_collinear_points() {
        let points: Vec<Point<i32>> = (0..10)
            .map(|x| Point::new(x, 0))
            .chain((0..10).map(|y| Point::new(10, y)))
            .chain((0..10).map(|x| Point::new(10 - x, 10)))
            .chain((0..10).map(|y| Point::new(0, 10 - y)))
            .collect();
        let ring = Contour::new(points);
        let simplified = ring.simplify(0.5);
        assert_eq!(simplified.len(), 4);
        assert_eq!(simplified.arc_length(), 40.0);
    }

    #[test]
    fn settings_translate_epsilon() {
        let settings = MeasurementSettings {
            approximation_epsilon: Some(1.5),
            ..Default::default()
        };
        assert_eq!(
            MeasureConfig::from(&settings).approximation,
            ContourApproximation::DouglasPeucker { epsilon: 1.5 }
        );
        let zero = MeasurementSettings {
            approximation_epsilon: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            MeasureConfig::from(zero).approximation,
            ContourApproximation::None
        );
    }
}
