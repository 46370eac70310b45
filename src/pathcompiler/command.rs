//! The plot-command stream: the stable boundary between the path compiler
//! and the executor (§6 "Plot-command stream").

/// One step of a plot, in drawing-space millimeters (SVG/top-left origin,
/// +X right, +Y down). Immutable once emitted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlotCommand {
    PenUp,
    PenDown,
    Move { x: f64, y: f64 },
    Line { x: f64, y: f64 },
}

/// Options controlling `svg_to_commands` (§4.3 public contract).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompileOptions {
    pub canvas_w: f64,
    pub canvas_h: f64,
    pub safety_margin: f64,
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            canvas_w: 210.0,
            canvas_h: 297.0,
            safety_margin: 3.0,
            optimize: true,
        }
    }
}
