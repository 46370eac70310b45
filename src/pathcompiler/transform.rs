//! Scales/centers flattened paths onto the canvas and clips them to the
//! safety margin (§4.3 steps 4–5).

use super::svgshapes::DocumentDims;

/// Uniform scale + centering offset mapping SVG user units to canvas
/// millimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl CanvasTransform {
    pub fn apply(&self, p: (f64, f64)) -> (f64, f64) {
        (p.0 * self.scale + self.offset_x, p.1 * self.scale + self.offset_y)
    }

    /// Builds the min-scale-and-center transform directly from a known
    /// source size, skipping `DocumentDims` extraction. Used by the
    /// fabric-canvas variant, whose source size is the JSON's own
    /// `width`/`height` fields rather than an SVG `viewBox`.
    pub fn direct_scale(src_w: f64, src_h: f64, canvas_w: f64, canvas_h: f64) -> Self {
        scale_and_center(src_w, src_h, canvas_w, canvas_h)
    }
}

fn scale_and_center(src_w: f64, src_h: f64, canvas_w: f64, canvas_h: f64) -> CanvasTransform {
    let scale = if src_w <= 0.0 || src_h <= 0.0 {
        1.0
    } else {
        let candidate = (canvas_w / src_w).min(canvas_h / src_h);
        if (candidate - 1.0).abs() > 1e-3 {
            candidate
        } else {
            1.0
        }
    };
    let offset_x = (canvas_w - src_w * scale) / 2.0;
    let offset_y = (canvas_h - src_h * scale) / 2.0;
    CanvasTransform { scale, offset_x, offset_y }
}

/// Derives the transform from the SVG's intrinsic dimensions (`viewBox`
/// preferred, else `width`/`height`) to `canvas_w x canvas_h` millimeters.
///
/// Falls back to an identity-ish 1:1 mapping centered on the canvas when the
/// document declares no dimensions at all.
pub fn derive_transform(dims: &DocumentDims, canvas_w: f64, canvas_h: f64) -> CanvasTransform {
    let (svg_w, svg_h) = dims
        .view_box
        .map(|(_, _, w, h)| (w, h))
        .or_else(|| match (dims.width, dims.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        })
        .unwrap_or((canvas_w, canvas_h));

    scale_and_center(svg_w, svg_h, canvas_w, canvas_h)
}

/// Clips a point coordinate-wise into `[margin, canvas - margin]`.
///
/// Per-point, not per-segment: a shape that crosses the boundary shows a
/// flat edge rather than being re-routed. Documented approximation.
pub fn clip_point(p: (f64, f64), canvas_w: f64, canvas_h: f64, margin: f64) -> (f64, f64) {
    let x = p.0.clamp(margin, canvas_w - margin);
    let y = p.1.clamp(margin, canvas_h - margin);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_viewbox_matches_canvas() {
        let dims = DocumentDims { view_box: Some((0.0, 0.0, 100.0, 100.0)), width: None, height: None };
        let t = derive_transform(&dims, 100.0, 100.0);
        assert_eq!(t.scale, 1.0);
        assert_eq!((t.offset_x, t.offset_y), (0.0, 0.0));
    }

    #[test]
    fn scales_and_centers_non_square_viewbox() {
        let dims = DocumentDims { view_box: Some((0.0, 0.0, 50.0, 100.0)), width: None, height: None };
        let t = derive_transform(&dims, 200.0, 200.0);
        // min(200/50, 200/100) = min(4.0, 2.0) = 2.0
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.offset_x, (200.0 - 100.0) / 2.0);
        assert_eq!(t.offset_y, (200.0 - 200.0) / 2.0);
    }

    #[test]
    fn falls_back_to_width_height_when_no_viewbox() {
        let dims = DocumentDims { view_box: None, width: Some(100.0), height: Some(100.0) };
        let t = derive_transform(&dims, 100.0, 100.0);
        assert_eq!(t.scale, 1.0);
    }

    #[test]
    fn clips_into_safety_margin() {
        assert_eq!(clip_point((-5.0, 500.0), 100.0, 100.0, 3.0), (3.0, 97.0));
        assert_eq!(clip_point((50.0, 50.0), 100.0, 100.0, 3.0), (50.0, 50.0));
    }
}
