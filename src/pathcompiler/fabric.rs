//! Fabric-canvas variant of `svg_to_commands` (§4.3 public contract:
//! "Also a fabric-canvas variant that consumes a pre-serialized object
//! tree"). Takes the JSON a fabric.js `canvas.toJSON()` call would produce
//! instead of SVG markup, and compiles it through the same flatten →
//! transform → clip → order → emit pipeline.
//!
//! Each object's own `left`/`top`/`scaleX`/`scaleY`/`angle` is applied as a
//! local affine transform before the document-wide canvas transform, with
//! the object's untransformed path/shape geometry defined relative to its
//! own origin — the conventional fabric.js object model with
//! `originX`/`originY` left at their "left"/"top" defaults. Objects using a
//! "center" origin are not distinguished from this (`original_source/`
//! carried no fabric fixtures to pin the distinction; Open Questions).

use super::command::PlotCommand;
use super::error::CompileError;
use super::order::order_paths;
use super::pathdata::{parse_path_data, Subpath};
use super::transform::{clip_point, CanvasTransform};
use serde_json::Value;

/// Local 2D affine transform for one fabric object: scale, then rotate
/// (degrees, clockwise, matching fabric's `angle`), then translate.
struct ObjectTransform {
    left: f64,
    top: f64,
    scale_x: f64,
    scale_y: f64,
    angle_rad: f64,
}

impl ObjectTransform {
    fn apply(&self, p: (f64, f64)) -> (f64, f64) {
        let (x, y) = (p.0 * self.scale_x, p.1 * self.scale_y);
        let (sin, cos) = self.angle_rad.sin_cos();
        let rx = x * cos - y * sin;
        let ry = x * sin + y * cos;
        (rx + self.left, ry + self.top)
    }
}

fn object_transform(obj: &Value) -> ObjectTransform {
    ObjectTransform {
        left: num(obj, "left", 0.0),
        top: num(obj, "top", 0.0),
        scale_x: num(obj, "scaleX", 1.0),
        scale_y: num(obj, "scaleY", 1.0),
        angle_rad: num(obj, "angle", 0.0).to_radians(),
    }
}

fn num(obj: &Value, key: &str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// Converts one fabric.js path-array segment (e.g. `["C", x1, y1, x2, y2,
/// x, y]`) into the matching fragment of an SVG path-data string.
fn segment_to_path_data(seg: &Value) -> Option<String> {
    let arr = seg.as_array()?;
    let cmd = arr.first()?.as_str()?;
    let nums: Vec<f64> = arr[1..].iter().filter_map(Value::as_f64).collect();
    if cmd.eq_ignore_ascii_case("z") {
        return Some("Z".to_string());
    }
    let coords = nums
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",");
    Some(format!("{cmd} {coords}"))
}

/// Builds an SVG-path-data string from a fabric `path` array (a list of
/// segment arrays), so the existing flattening parser can be reused
/// unchanged.
fn fabric_path_array_to_path_data(path: &Value) -> Option<String> {
    let segments = path.as_array()?;
    let mut out = String::new();
    for seg in segments {
        if let Some(fragment) = segment_to_path_data(seg) {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&fragment);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Synthesizes local (object-space) path data for fabric's primitive shape
/// types, mirroring `svgshapes::synthesize_path_data` but reading fabric's
/// field names and the object's own `width`/`height`/`radius` rather than
/// SVG attributes.
fn shape_path_data(obj: &Value, kind: &str) -> Option<String> {
    match kind {
        "rect" => {
            let w = num(obj, "width", 0.0);
            let h = num(obj, "height", 0.0);
            if w <= 0.0 || h <= 0.0 {
                return None;
            }
            Some(format!("M0,0 L{w},0 L{w},{h} L0,{h} Z"))
        }
        "circle" => {
            let r = num(obj, "radius", 0.0);
            if r <= 0.0 {
                return None;
            }
            Some(format!(
                "M{},0 A{r},{r} 0 1 0 {},0 A{r},{r} 0 1 0 {},0 Z",
                -r, r, -r
            ))
        }
        "ellipse" => {
            let rx = num(obj, "rx", 0.0);
            let ry = num(obj, "ry", 0.0);
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            Some(format!(
                "M{},0 A{rx},{ry} 0 1 0 {},0 A{rx},{ry} 0 1 0 {},0 Z",
                -rx, rx, -rx
            ))
        }
        "line" => {
            let x1 = num(obj, "x1", 0.0);
            let y1 = num(obj, "y1", 0.0);
            let x2 = num(obj, "x2", 0.0);
            let y2 = num(obj, "y2", 0.0);
            Some(format!("M{x1},{y1} L{x2},{y2}"))
        }
        "polyline" | "polygon" => {
            let points = obj.get("points")?.as_array()?;
            let coords: Vec<(f64, f64)> = points
                .iter()
                .filter_map(|p| Some((p.get("x")?.as_f64()?, p.get("y")?.as_f64()?)))
                .collect();
            if coords.len() < 2 {
                return None;
            }
            let mut d = format!("M{},{}", coords[0].0, coords[0].1);
            for (x, y) in &coords[1..] {
                d.push_str(&format!(" L{x},{y}"));
            }
            if kind == "polygon" {
                d.push_str(" Z");
            }
            Some(d)
        }
        _ => None,
    }
}

/// One object's local path data plus the affine transform that places it on
/// the canvas.
fn object_path_data(obj: &Value) -> Option<(String, ObjectTransform)> {
    let kind = obj.get("type")?.as_str()?;
    let path_data = if kind == "path" {
        fabric_path_array_to_path_data(obj.get("path")?)?
    } else {
        shape_path_data(obj, kind)?
    };
    Some((path_data, object_transform(obj)))
}

/// Compiles a fabric.js canvas JSON object tree (`canvas.toJSON()` output)
/// into an ordered plot-command stream, per the same options and pipeline
/// as [`super::svg_to_commands`].
pub fn fabric_to_commands(
    canvas_json: &str,
    options: super::CompileOptions,
) -> Result<Vec<PlotCommand>, CompileError> {
    let root: Value = serde_json::from_str(canvas_json)
        .map_err(|e| CompileError::InvalidSvg(format!("invalid fabric json: {e}")))?;
    let objects = root
        .get("objects")
        .and_then(Value::as_array)
        .ok_or_else(|| CompileError::InvalidSvg("fabric json has no \"objects\" array".into()))?;

    let canvas_w = root.get("width").and_then(Value::as_f64).unwrap_or(options.canvas_w);
    let canvas_h = root.get("height").and_then(Value::as_f64).unwrap_or(options.canvas_h);
    // Fabric's own canvas dimensions already are the intrinsic document
    // size in the same units as the target canvas, so no separate
    // `DocumentDims`-derived scale is needed beyond honoring a mismatch
    // between the declared canvas size and the requested output size.
    let transform = CanvasTransform::direct_scale(canvas_w, canvas_h, options.canvas_w, options.canvas_h);

    let mut subpaths: Vec<Subpath> = Vec::new();
    for obj in objects {
        let Some((path_data, obj_transform)) = object_path_data(obj) else {
            continue;
        };
        let mut parsed = parse_path_data(&path_data)?;
        for subpath in &mut parsed {
            for p in &mut subpath.points {
                *p = obj_transform.apply(*p);
                *p = transform.apply(*p);
                *p = clip_point(*p, options.canvas_w, options.canvas_h, options.safety_margin);
            }
        }
        subpaths.extend(parsed);
    }

    let ordered = if options.optimize {
        order_paths(subpaths, (0.0, 0.0))
    } else {
        subpaths.into_iter().filter(|p| !p.points.is_empty()).collect()
    };

    let mut commands = Vec::new();
    for path in &ordered {
        let mut points = path.points.iter();
        let Some(&first) = points.next() else { continue };
        commands.push(PlotCommand::PenUp);
        commands.push(PlotCommand::Move { x: first.0, y: first.1 });
        commands.push(PlotCommand::PenDown);
        for &(x, y) in points {
            commands.push(PlotCommand::Line { x, y });
        }
    }
    if !commands.is_empty() {
        commands.push(PlotCommand::PenUp);
    }

    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathcompiler::CompileOptions;

    #[test]
    fn compiles_a_rect_object() {
        let json = r#"{
            "width": 100, "height": 100,
            "objects": [
                {"type": "rect", "left": 10, "top": 10, "width": 20, "height": 30}
            ]
        }"#;
        let options = CompileOptions { canvas_w: 100.0, canvas_h: 100.0, safety_margin: 3.0, optimize: true };
        let cmds = fabric_to_commands(json, options).unwrap();
        assert_eq!(cmds[0], PlotCommand::PenUp);
        assert_eq!(cmds[1], PlotCommand::Move { x: 10.0, y: 10.0 });
        assert_eq!(cmds[2], PlotCommand::PenDown);
        assert_eq!(*cmds.last().unwrap(), PlotCommand::PenUp);
    }

    #[test]
    fn compiles_a_path_object_with_scale_and_translate() {
        let json = r#"{
            "width": 100, "height": 100,
            "objects": [
                {"type": "path", "left": 0, "top": 0, "scaleX": 2, "scaleY": 2,
                 "path": [["M", 0, 0], ["L", 5, 5], ["Z"]]}
            ]
        }"#;
        let options = CompileOptions { canvas_w: 100.0, canvas_h: 100.0, safety_margin: 0.0, optimize: true };
        let cmds = fabric_to_commands(json, options).unwrap();
        assert_eq!(cmds[1], PlotCommand::Move { x: 0.0, y: 0.0 });
        assert_eq!(cmds[3], PlotCommand::Line { x: 10.0, y: 10.0 });
    }

    #[test]
    fn missing_objects_array_is_rejected() {
        let err = fabric_to_commands("{}", CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidSvg(_)));
    }

    #[test]
    fn unknown_object_types_are_skipped() {
        let json = r#"{"width":10,"height":10,"objects":[{"type":"textbox","text":"hi"}]}"#;
        let cmds = fabric_to_commands(json, CompileOptions::default()).unwrap();
        assert!(cmds.is_empty());
    }
}
