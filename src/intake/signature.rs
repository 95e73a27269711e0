//! Signature capture. Free-hand strokes rendered to a PNG.
//!
//! [`SignaturePad`] works purely in surface-local CSS pixels. The
//! [`SignatureCapture`] wrapper owns the surface geometry, turns raw mouse or
//! touch input into pad points, and ignores everything while no surface is
//! attached.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::model::SignatureImage;
use crate::error::SignatureError;

/// Largest backing raster edge, in device pixels.
pub const MAX_SURFACE_EDGE: u32 = 4096;

/// Points kept per signature. Samples past this are dropped.
pub const MAX_SIGNATURE_POINTS: usize = 10_000;

/// A point in surface-local CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pen appearance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureStyle {
    /// Stroke width in CSS pixels.
    pub stroke_width: f32,
    /// RGB ink colour.
    pub color: [u8; 3],
}

impl Default for SignatureStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2.5,
            color: [0x1A, 0x20, 0x2C],
        }
    }
}

/// Where the drawing surface sits on screen and how dense its pixels are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceGeometry {
    /// Left edge in client coordinates.
    pub left: f32,
    /// Top edge in client coordinates.
    pub top: f32,
    /// Width in CSS pixels.
    pub width: f32,
    /// Height in CSS pixels.
    pub height: f32,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

impl SurfaceGeometry {
    /// A usable surface has a positive, finite size and pixel ratio, and a
    /// backing raster no larger than [`MAX_SURFACE_EDGE`] on either side.
    pub fn is_usable(&self) -> bool {
        let positive = [self.width, self.height, self.device_pixel_ratio]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        let limit = MAX_SURFACE_EDGE as f32;
        positive
            && (self.width * self.device_pixel_ratio).round() <= limit
            && (self.height * self.device_pixel_ratio).round() <= limit
    }

    /// Backing raster size in device pixels, at least 1×1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let w = (self.width * self.device_pixel_ratio).round().max(1.0) as u32;
        let h = (self.height * self.device_pixel_ratio).round().max(1.0) as u32;
        (w, h)
    }

    /// Turn a mouse or touch sample into a surface-local point.
    ///
    /// Client coordinates are already in CSS pixels, so only the surface
    /// origin is subtracted; the pixel ratio is applied at render time.
    pub fn normalize(&self, input: &InputEvent) -> Option<Point> {
        let (client_x, client_y) = match input {
            InputEvent::Mouse { client_x, client_y } => (*client_x, *client_y),
            InputEvent::Touch { touches } => {
                let first = touches.first()?;
                (first.client_x, first.client_y)
            }
        };
        Some(Point::new(client_x - self.left, client_y - self.top))
    }
}

/// One touch contact in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub client_x: f32,
    pub client_y: f32,
}

/// Raw pointer input as delivered by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device", rename_all = "snake_case")]
pub enum InputEvent {
    Mouse { client_x: f32, client_y: f32 },
    Touch { touches: Vec<TouchPoint> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPhase {
    /// Mouse down / touch start.
    Down,
    /// Mouse move / touch move.
    Move,
    /// Mouse up / touch end.
    Up,
    /// Pointer left the surface.
    Leave,
}

/// A timestamped pointer sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    #[serde(default)]
    pub input: Option<InputEvent>,
    pub timestamp_ms: u64,
}

/// An RGBA8 image in device pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Fully transparent raster. Fails for sizes past [`MAX_SURFACE_EDGE`].
    pub fn blank(width: u32, height: u32) -> Result<Self, SignatureError> {
        let too_large = SignatureError::SurfaceTooLarge { width, height };
        if width > MAX_SURFACE_EDGE || height > MAX_SURFACE_EDGE {
            return Err(too_large);
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(too_large)?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    /// True when no pixel carries any ink.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.pixels[(y as usize * self.width as usize + x as usize) * 4 + 3]
    }

    /// Encode as an 8-bit RGBA PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, SignatureError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }

    /// Draw an anti-aliased segment with round caps. Coordinates and width
    /// are in device pixels.
    fn stroke_segment(&mut self, a: Point, b: Point, width: f32, color: [u8; 3]) {
        let half = width / 2.0;
        let reach = half + 1.0;
        let min_x = (a.x.min(b.x) - reach).floor().max(0.0) as u32;
        let min_y = (a.y.min(b.y) - reach).floor().max(0.0) as u32;
        let max_x = ((a.x.max(b.x) + reach).ceil().max(0.0) as u32).min(self.width);
        let max_y = ((a.y.max(b.y) + reach).ceil().max(0.0) as u32).min(self.height);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let coverage = (half + 0.5 - distance_to_segment(center, a, b)).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let idx = (y as usize * self.width as usize + x as usize) * 4;
                let dst_alpha = self.pixels[idx + 3] as f32 / 255.0;
                let out_alpha = coverage + dst_alpha * (1.0 - coverage);
                self.pixels[idx] = color[0];
                self.pixels[idx + 1] = color[1];
                self.pixels[idx + 2] = color[2];
                self.pixels[idx + 3] = (out_alpha * 255.0).round() as u8;
            }
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Stroke recorder for one drawing surface.
#[derive(Debug, Clone)]
pub struct SignaturePad {
    surface: SurfaceGeometry,
    style: SignatureStyle,
    strokes: Vec<Vec<Point>>,
    points: usize,
    drawing: bool,
    has_content: bool,
}

impl SignaturePad {
    pub fn new(surface: SurfaceGeometry, style: SignatureStyle) -> Self {
        Self {
            surface,
            style,
            strokes: Vec::new(),
            points: 0,
            drawing: false,
            has_content: false,
        }
    }

    /// Whether at least one segment has been drawn since the last clear.
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    pub fn surface(&self) -> &SurfaceGeometry {
        &self.surface
    }

    /// The surface moved or was resized. Strokes stay in CSS pixels.
    pub fn set_surface(&mut self, surface: SurfaceGeometry) {
        self.surface = surface;
    }

    /// Start a new stroke at `point`. Ignored once the pad is full.
    pub fn begin(&mut self, point: Point) {
        if self.is_full() {
            debug!("Signature point limit reached, stroke ignored");
            self.drawing = false;
            return;
        }
        self.strokes.push(vec![point]);
        self.points += 1;
        self.drawing = true;
    }

    /// Whether the pad holds [`MAX_SIGNATURE_POINTS`] points.
    pub fn is_full(&self) -> bool {
        self.points >= MAX_SIGNATURE_POINTS
    }

    /// Connect the last point of the active stroke to `point`. Returns
    /// whether a segment was recorded.
    pub fn extend(&mut self, point: Point) -> bool {
        if !self.drawing || self.is_full() {
            return false;
        }
        let Some(stroke) = self.strokes.last_mut() else {
            return false;
        };
        stroke.push(point);
        self.points += 1;
        self.has_content = true;
        true
    }

    /// Close the active stroke, if any.
    pub fn end(&mut self) {
        self.drawing = false;
    }

    /// Erase everything.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.points = 0;
        self.drawing = false;
        self.has_content = false;
    }

    /// Rasterize the strokes at device pixel resolution.
    pub fn render(&self) -> Result<Raster, SignatureError> {
        let (width, height) = self.surface.pixel_size();
        let mut raster = Raster::blank(width, height)?;
        let scale = self.surface.device_pixel_ratio;
        let line_width = self.style.stroke_width * scale;

        for stroke in &self.strokes {
            for pair in stroke.windows(2) {
                let a = Point::new(pair[0].x * scale, pair[0].y * scale);
                let b = Point::new(pair[1].x * scale, pair[1].y * scale);
                raster.stroke_segment(a, b, line_width, self.style.color);
            }
        }
        Ok(raster)
    }

    /// Render and PNG-encode the visible content. Blank when nothing was
    /// drawn; callers gate on [`SignaturePad::has_content`].
    pub fn export(&self) -> Result<SignatureImage, SignatureError> {
        let png = self.render()?.encode_png()?;
        Ok(SignatureImage::from_png(png))
    }
}

/// Device-facing signature input for the consent step.
#[derive(Debug, Clone, Default)]
pub struct SignatureCapture {
    style: SignatureStyle,
    pad: Option<SignaturePad>,
    last_sample_ms: Option<u64>,
}

impl SignatureCapture {
    pub fn new(style: SignatureStyle) -> Self {
        Self {
            style,
            pad: None,
            last_sample_ms: None,
        }
    }

    /// Attach (or re-measure) the drawing surface. Unusable geometry is
    /// ignored.
    pub fn attach(&mut self, surface: SurfaceGeometry) {
        if !surface.is_usable() {
            debug!(?surface, "Ignoring unusable signature surface");
            return;
        }
        match self.pad.as_mut() {
            Some(pad) => pad.set_surface(surface),
            None => self.pad = Some(SignaturePad::new(surface, self.style)),
        }
    }

    /// Whether a surface is attached.
    pub fn is_ready(&self) -> bool {
        self.pad.is_some()
    }

    pub fn has_content(&self) -> bool {
        self.pad.as_ref().is_some_and(SignaturePad::has_content)
    }

    pub fn pad(&self) -> Option<&SignaturePad> {
        self.pad.as_ref()
    }

    /// Surface-local point for a raw input, if a surface is attached.
    pub fn normalize(&self, input: &InputEvent) -> Option<Point> {
        self.pad.as_ref()?.surface().normalize(input)
    }

    /// Feed one pointer sample into the pad.
    pub fn handle(&mut self, event: &PointerEvent) {
        let point = event.input.as_ref().and_then(|i| self.normalize(i));
        let Some(pad) = self.pad.as_mut() else {
            debug!(phase = ?event.phase, "Signature surface unavailable, input ignored");
            return;
        };

        match event.phase {
            PointerPhase::Down => {
                let Some(point) = point else {
                    return;
                };
                pad.begin(point);
                self.last_sample_ms = Some(event.timestamp_ms);
            }
            PointerPhase::Move => {
                if !pad.is_drawing() {
                    return;
                }
                if self.last_sample_ms.is_some_and(|last| event.timestamp_ms <= last) {
                    trace!(timestamp_ms = event.timestamp_ms, "Dropping out-of-order sample");
                    return;
                }
                let Some(point) = point else {
                    return;
                };
                pad.extend(point);
                self.last_sample_ms = Some(event.timestamp_ms);
            }
            PointerPhase::Up | PointerPhase::Leave => {
                pad.end();
                self.last_sample_ms = None;
            }
        }
    }

    /// Erase the signature.
    pub fn clear(&mut self) {
        if let Some(pad) = self.pad.as_mut() {
            pad.clear();
        }
        self.last_sample_ms = None;
    }

    /// Export the current content. `None` while no surface is attached.
    pub fn export(&self) -> Result<Option<SignatureImage>, SignatureError> {
        self.pad.as_ref().map(SignaturePad::export).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> SurfaceGeometry {
        SurfaceGeometry {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 40.0,
            device_pixel_ratio: 1.0,
        }
    }

    fn mouse(phase: PointerPhase, x: f32, y: f32, t: u64) -> PointerEvent {
        PointerEvent {
            phase,
            input: Some(InputEvent::Mouse {
                client_x: x,
                client_y: y,
            }),
            timestamp_ms: t,
        }
    }

    #[test]
    fn stroke_round_trip_exports_ink_then_blank() {
        let mut pad = SignaturePad::new(surface(), SignatureStyle::default());
        pad.begin(Point::new(10.0, 10.0));
        pad.extend(Point::new(40.0, 20.0));
        pad.extend(Point::new(80.0, 30.0));
        pad.end();
        assert!(pad.has_content());
        assert!(!pad.render().unwrap().is_blank());

        let image = pad.export().unwrap();
        let decoder = png::Decoder::new(image.png_bytes());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (100, 40));
        assert!(buf[..info.buffer_size()].chunks_exact(4).any(|px| px[3] > 0));

        pad.clear();
        assert!(!pad.has_content());
        assert!(pad.render().unwrap().is_blank());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut pad = SignaturePad::new(surface(), SignatureStyle::default());
        pad.begin(Point::new(1.0, 1.0));
        pad.extend(Point::new(5.0, 5.0));
        pad.clear();
        pad.clear();
        assert!(!pad.has_content());
        assert!(pad.strokes().is_empty());
    }

    #[test]
    fn begin_alone_draws_nothing() {
        let mut pad = SignaturePad::new(surface(), SignatureStyle::default());
        pad.begin(Point::new(10.0, 10.0));
        pad.end();
        assert!(!pad.has_content());
        assert!(pad.render().unwrap().is_blank());
    }

    #[test]
    fn extend_without_begin_is_ignored() {
        let mut pad = SignaturePad::new(surface(), SignatureStyle::default());
        assert!(!pad.extend(Point::new(3.0, 3.0)));
        pad.begin(Point::new(1.0, 1.0));
        pad.end();
        assert!(!pad.extend(Point::new(3.0, 3.0)));
        assert!(!pad.has_content());
    }

    #[test]
    fn empty_export_is_blank_image() {
        let pad = SignaturePad::new(surface(), SignatureStyle::default());
        let image = pad.export().unwrap();
        assert!(!image.png_bytes().is_empty());
        assert!(pad.render().unwrap().is_blank());
    }

    #[test]
    fn high_dpi_strokes_land_under_the_pointer() {
        let geometry = SurfaceGeometry {
            left: 50.0,
            top: 100.0,
            width: 100.0,
            height: 40.0,
            device_pixel_ratio: 2.0,
        };
        let mut capture = SignatureCapture::new(SignatureStyle::default());
        capture.attach(geometry);
        capture.handle(&mouse(PointerPhase::Down, 60.0, 120.0, 1));
        capture.handle(&mouse(PointerPhase::Move, 140.0, 120.0, 2));
        capture.handle(&mouse(PointerPhase::Up, 140.0, 120.0, 3));

        let raster = capture.pad().unwrap().render().unwrap();
        assert_eq!((raster.width, raster.height), (200, 80));
        // CSS (10, 20) .. (90, 20) → device row 40
        assert!(raster.alpha_at(100, 40) > 0);
        assert_eq!(raster.alpha_at(100, 10), 0);
    }

    #[test]
    fn touch_and_mouse_normalize_the_same() {
        let geometry = SurfaceGeometry {
            left: 20.0,
            top: 30.0,
            ..surface()
        };
        let m = geometry.normalize(&InputEvent::Mouse {
            client_x: 25.0,
            client_y: 35.0,
        });
        let t = geometry.normalize(&InputEvent::Touch {
            touches: vec![TouchPoint {
                client_x: 25.0,
                client_y: 35.0,
            }],
        });
        assert_eq!(m, Some(Point::new(5.0, 5.0)));
        assert_eq!(m, t);
        assert!(geometry.normalize(&InputEvent::Touch { touches: vec![] }).is_none());
    }

    #[test]
    fn input_ignored_without_surface() {
        let mut capture = SignatureCapture::new(SignatureStyle::default());
        capture.handle(&mouse(PointerPhase::Down, 1.0, 1.0, 1));
        capture.handle(&mouse(PointerPhase::Move, 9.0, 9.0, 2));
        assert!(!capture.is_ready());
        assert!(!capture.has_content());
        assert!(capture.export().unwrap().is_none());

        capture.attach(SurfaceGeometry {
            width: 0.0,
            ..surface()
        });
        assert!(!capture.is_ready());
    }

    #[test]
    fn stale_samples_are_dropped() {
        let mut capture = SignatureCapture::new(SignatureStyle::default());
        capture.attach(surface());
        capture.handle(&mouse(PointerPhase::Down, 1.0, 1.0, 10));
        capture.handle(&mouse(PointerPhase::Move, 5.0, 5.0, 10));
        assert!(!capture.has_content());
        capture.handle(&mouse(PointerPhase::Move, 5.0, 5.0, 11));
        assert!(capture.has_content());
        assert_eq!(capture.pad().unwrap().strokes()[0].len(), 2);
    }

    #[test]
    fn oversized_surface_is_never_attached() {
        let mut capture = SignatureCapture::new(SignatureStyle::default());
        capture.attach(SurfaceGeometry {
            width: 200_000.0,
            height: 200_000.0,
            ..surface()
        });
        assert!(!capture.is_ready());

        capture.attach(SurfaceGeometry {
            width: 3000.0,
            device_pixel_ratio: 2.0,
            ..surface()
        });
        assert!(!capture.is_ready());

        capture.attach(SurfaceGeometry {
            width: 2048.0,
            height: 2048.0,
            device_pixel_ratio: 2.0,
            ..surface()
        });
        assert!(capture.is_ready());
    }

    #[test]
    fn oversized_raster_is_an_error() {
        assert!(matches!(
            Raster::blank(200_000, 200_000),
            Err(SignatureError::SurfaceTooLarge { .. })
        ));
        assert!(Raster::blank(MAX_SURFACE_EDGE, 1).is_ok());
    }

    #[test]
    fn point_limit_caps_strokes() {
        let mut capture = SignatureCapture::new(SignatureStyle::default());
        capture.attach(surface());
        capture.handle(&mouse(PointerPhase::Down, 1.0, 1.0, 0));
        for t in 1..(MAX_SIGNATURE_POINTS as u64 + 50) {
            capture.handle(&mouse(PointerPhase::Move, (t % 90) as f32, 10.0, t));
        }
        capture.handle(&mouse(PointerPhase::Up, 0.0, 0.0, u64::MAX));
        let pad = capture.pad().unwrap();
        assert!(pad.is_full());
        let total: usize = pad.strokes().iter().map(Vec::len).sum();
        assert_eq!(total, MAX_SIGNATURE_POINTS);

        capture.handle(&mouse(PointerPhase::Down, 5.0, 5.0, 1));
        assert_eq!(capture.pad().unwrap().strokes().len(), 1);

        capture.clear();
        assert!(!capture.pad().unwrap().is_full());
    }

    #[test]
    fn capture_normalizes_against_attached_surface() {
        let mut capture = SignatureCapture::new(SignatureStyle::default());
        let input = InputEvent::Mouse {
            client_x: 25.0,
            client_y: 35.0,
        };
        assert!(capture.normalize(&input).is_none());
        capture.attach(SurfaceGeometry {
            left: 20.0,
            top: 30.0,
            ..surface()
        });
        assert_eq!(capture.normalize(&input), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn pointer_event_wire_format() {
        let json = serde_json::json!({
            "phase": "move",
            "input": {"device": "touch", "touches": [{"client_x": 3.0, "client_y": 4.0}]},
            "timestamp_ms": 42
        });
        let event: PointerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.phase, PointerPhase::Move);
        assert!(matches!(event.input, Some(InputEvent::Touch { .. })));

        let up: PointerEvent =
            serde_json::from_value(serde_json::json!({"phase": "up", "timestamp_ms": 43})).unwrap();
        assert!(up.input.is_none());
    }
}
