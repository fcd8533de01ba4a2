//! Detection overlay canvas.
//!
//! Each cycle the canvas is resized to the video's native resolution, cleared,
//! and redrawn with one box per face, its landmarks, and an expression bar
//! under the box whose length is the dominant expression score.

use std::path::Path;

use image::{ImageFormat, ImageResult, Rgba, RgbaImage};
use moodroom_core::{Expression, Resolution};

use crate::model::{BoundingBox, FaceDetection};

const BOX_COLOR: Rgba<u8> = Rgba([0, 120, 255, 255]);
const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 255, 140, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const BOX_STROKE: u32 = 2;
const BAR_HEIGHT: u32 = 6;

/// Initial size before the first frame arrives.
pub const DEFAULT_CANVAS: Resolution = Resolution { width: 720, height: 560 };

pub struct OverlayCanvas {
    image: RgbaImage,
}

impl Default for OverlayCanvas {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS)
    }
}

impl OverlayCanvas {
    pub fn new(size: Resolution) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
        }
    }

    pub fn size(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// Resize to `size` if it differs. Resizing discards the contents.
    pub fn match_dimensions(&mut self, size: Resolution) {
        if self.size() != size {
            self.image = RgbaImage::new(size.width, size.height);
        }
    }

    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = CLEAR;
        }
    }

    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|px| px[3] == 0)
    }

    /// Redraw for one cycle. `detections` are in `source` pixel space.
    pub fn draw(
        &mut self,
        source: Resolution,
        detections: &[FaceDetection],
        label: Option<Expression>,
    ) {
        self.match_dimensions(source);
        self.clear();

        for (i, face) in detections.iter().enumerate() {
            self.stroke_box(&face.bbox);
            for p in &face.landmarks {
                self.dot(p.x, p.y, LANDMARK_COLOR);
            }
            // the first face carries the classified label, the rest show their top score
            let bar = match (i, label) {
                (0, Some(expr)) => (expr, face.expressions.score(expr)),
                _ => face.expressions.dominant(),
            };
            self.expression_bar(&face.bbox, bar.0, bar.1);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        self.image.save_with_format(path, ImageFormat::Png)
    }

    /// Fill `[x0, x1) x [y0, y1)`, clipped to the canvas.
    fn fill(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let (x0, x1) = (x0.clamp(0, w), x1.clamp(0, w));
        let (y0, y1) = (y0.clamp(0, h), y1.clamp(0, h));
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    fn stroke_box(&mut self, b: &BoundingBox) {
        let (x0, y0) = (px(b.x), px(b.y));
        let (x1, y1) = (px(b.x + b.width), px(b.y + b.height));
        let s = BOX_STROKE as i64;
        self.fill(x0, y0, x1, y0.saturating_add(s), BOX_COLOR);
        self.fill(x0, y1.saturating_sub(s), x1, y1, BOX_COLOR);
        self.fill(x0, y0, x0.saturating_add(s), y1, BOX_COLOR);
        self.fill(x1.saturating_sub(s), y0, x1, y1, BOX_COLOR);
    }

    fn dot(&mut self, x: f32, y: f32, color: Rgba<u8>) {
        let (cx, cy) = (px(x), px(y));
        self.fill(
            cx.saturating_sub(1),
            cy.saturating_sub(1),
            cx.saturating_add(2),
            cy.saturating_add(2),
            color,
        );
    }

    fn expression_bar(&mut self, b: &BoundingBox, expression: Expression, score: f32) {
        let [r, g, bl] = expression.color();
        let len = px(b.width * score.clamp(0.0, 1.0));
        let x0 = px(b.x);
        let y0 = px(b.y + b.height).saturating_add(2);
        self.fill(
            x0,
            y0,
            x0.saturating_add(len),
            y0.saturating_add(BAR_HEIGHT as i64),
            Rgba([r, g, bl, 255]),
        );
    }
}

/// Float to pixel coordinate; the cast saturates and maps NaN to 0.
fn px(v: f32) -> i64 {
    v.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;
    use moodroom_core::ExpressionScores;

    fn face() -> FaceDetection {
        FaceDetection {
            score: 0.9,
            bbox: BoundingBox { x: 10.0, y: 10.0, width: 40.0, height: 40.0 },
            landmarks: vec![Point { x: 30.0, y: 30.0 }],
            expressions: ExpressionScores { happy: 0.8, ..Default::default() },
        }
    }

    #[test]
    fn canvas_matches_native_resolution() {
        let mut canvas = OverlayCanvas::default();
        assert_eq!(canvas.size(), DEFAULT_CANVAS);

        canvas.draw(Resolution::new(64, 48), &[], None);
        assert_eq!(canvas.size(), Resolution::new(64, 48));
        assert!(canvas.is_blank());
    }

    #[test]
    fn draws_box_landmarks_and_bar() {
        let mut canvas = OverlayCanvas::new(Resolution::new(80, 80));
        canvas.draw(Resolution::new(80, 80), &[face()], Some(Expression::Happy));

        let img = canvas.image();
        assert_eq!(*img.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(30, 30), LANDMARK_COLOR);
        let [r, g, b] = Expression::Happy.color();
        assert_eq!(*img.get_pixel(12, 53), Rgba([r, g, b, 255]));
        // bar covers 0.8 of the box width
        assert_eq!(img.get_pixel(45, 53)[3], 0);
    }

    #[test]
    fn next_cycle_without_faces_clears_canvas() {
        let mut canvas = OverlayCanvas::new(Resolution::new(80, 80));
        canvas.draw(Resolution::new(80, 80), &[face()], Some(Expression::Happy));
        assert!(!canvas.is_blank());

        canvas.draw(Resolution::new(80, 80), &[], None);
        assert!(canvas.is_blank());
    }

    #[test]
    fn out_of_bounds_boxes_are_clipped() {
        let mut canvas = OverlayCanvas::new(Resolution::new(20, 20));
        let mut big = face();
        big.bbox = BoundingBox { x: -10.0, y: -10.0, width: 100.0, height: 100.0 };
        canvas.draw(Resolution::new(20, 20), &[big], None);
        assert_eq!(canvas.size(), Resolution::new(20, 20));
    }

    #[test]
    fn huge_boxes_draw_quickly() {
        let mut canvas = OverlayCanvas::new(Resolution::new(64, 48));
        let mut wide = face();
        wide.bbox = BoundingBox { x: 0.0, y: 0.0, width: 3e8, height: 20.0 };

        let started = std::time::Instant::now();
        canvas.draw(Resolution::new(64, 48), &[wide], Some(Expression::Happy));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        let img = canvas.image();
        assert_eq!(*img.get_pixel(63, 0), BOX_COLOR);
        let [r, g, b] = Expression::Happy.color();
        assert_eq!(*img.get_pixel(63, 22), Rgba([r, g, b, 255]));
    }

    #[test]
    fn far_off_canvas_coordinates_do_not_overflow() {
        let mut canvas = OverlayCanvas::new(Resolution::new(64, 48));
        let mut far = face();
        far.bbox = BoundingBox { x: -3e38, y: 3e38, width: 3e38, height: 3e38 };
        far.landmarks = vec![Point { x: f32::MAX, y: f32::MIN }, Point { x: f32::NAN, y: 5.0 }];

        canvas.draw(Resolution::new(64, 48), &[far], None);
        assert_eq!(canvas.size(), Resolution::new(64, 48));
        // the NaN landmark lands at x = 0
        assert_eq!(*canvas.image().get_pixel(0, 5), LANDMARK_COLOR);
    }
}
