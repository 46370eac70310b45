//! Drawing-space to machine-space coordinate transform (§4.4 "Coordinate
//! transform").
//!
//! The paper sits flush to the back-right of the bed; machine home is at
//! the back-left, +X right, −Y toward the user. An SVG point uses the usual
//! top-left origin with +Y down.

use super::config::ExecutorConfig;

/// Maps a drawing-space point `(sx, sy)` into the machine frame.
pub fn drawing_to_machine(config: &ExecutorConfig, sx: f64, sy: f64) -> (f64, f64) {
    let machine_x = config.origin_x + (sx - config.canvas_w);
    let machine_y = config.origin_y - sy;
    (machine_x, machine_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::config::PaperSize;

    #[test]
    fn s5_coordinate_transform() {
        let config = ExecutorConfig::for_paper(PaperSize::Custom { w: 210.0, h: 297.0 });
        assert_eq!(drawing_to_machine(&config, 0.0, 0.0), (80.0, 0.0));
        assert_eq!(drawing_to_machine(&config, 210.0, 297.0), (290.0, -297.0));
        assert_eq!(drawing_to_machine(&config, 105.0, 148.5), (185.0, -148.5));
    }

    #[test]
    fn invariant_8_transform_is_involution_on_paper_origin() {
        let config = ExecutorConfig::default();
        assert_eq!(
            drawing_to_machine(&config, config.canvas_w, 0.0),
            (config.origin_x, config.origin_y)
        );
    }
}
