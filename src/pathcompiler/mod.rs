//! SVG-to-plot-command compiler: parse, flatten, transform, clip, order,
//! emit (§4.3).

mod arc;
mod command;
mod error;
mod fabric;
mod order;
mod pathdata;
mod svgshapes;
mod transform;

pub use command::{CompileOptions, PlotCommand};
pub use error::CompileError;
pub use fabric::fabric_to_commands;

use order::order_paths;
use pathdata::{parse_path_data, Subpath};
use svgshapes::{extract_path_data_strings, parse_document_dims};
use transform::{clip_point, derive_transform};

/// Compiles SVG markup into an ordered plot-command stream (§4.3 public
/// contract). Given identical input and options the output is
/// byte-identical — every stage here is a pure function of its input.
pub fn svg_to_commands(svg_text: &str, options: CompileOptions) -> Result<Vec<PlotCommand>, CompileError> {
    let dims = parse_document_dims(svg_text);
    let raw_paths = extract_path_data_strings(svg_text)?;

    let mut subpaths: Vec<Subpath> = Vec::new();
    for d in &raw_paths {
        subpaths.extend(parse_path_data(d)?);
    }

    let transform = derive_transform(&dims, options.canvas_w, options.canvas_h);
    for subpath in &mut subpaths {
        for p in &mut subpath.points {
            *p = transform.apply(*p);
            *p = clip_point(*p, options.canvas_w, options.canvas_h, options.safety_margin);
        }
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

    #[test]
    fn s3_cubic_flattens_to_eight_lines() {
        let svg = r#"<svg viewBox="0 0 100 100"><path d="M10,10 C 10,90 90,90 90,10"/></svg>"#;
        let options = CompileOptions { canvas_w: 100.0, canvas_h: 100.0, safety_margin: 3.0, optimize: true };
        let cmds = svg_to_commands(svg, options).unwrap();

        assert_eq!(cmds[0], PlotCommand::PenUp);
        assert_eq!(cmds[1], PlotCommand::Move { x: 10.0, y: 10.0 });
        assert_eq!(cmds[2], PlotCommand::PenDown);

        let lines: Vec<_> = cmds[3..].iter().filter(|c| matches!(c, PlotCommand::Line { .. })).collect();
        assert_eq!(lines.len(), 8);
        if let PlotCommand::Line { x, y } = lines.last().unwrap() {
            assert!((x - 90.0).abs() < 0.01);
            assert!((y - 10.0).abs() < 0.01);
        }
        assert_eq!(*cmds.last().unwrap(), PlotCommand::PenUp);
    }

    #[test]
    fn s4_arc_clips_to_safety_margin() {
        let svg = r#"<svg viewBox="0 0 100 100"><path d="M0,50 A50,50 0 0 1 100,50"/></svg>"#;
        let options = CompileOptions { canvas_w: 100.0, canvas_h: 100.0, safety_margin: 3.0, optimize: true };
        let cmds = svg_to_commands(svg, options).unwrap();

        assert_eq!(cmds[0], PlotCommand::PenUp);
        assert_eq!(cmds[1], PlotCommand::Move { x: 3.0, y: 50.0 });
        assert_eq!(cmds[2], PlotCommand::PenDown);

        let lines: Vec<_> = cmds[3..]
            .iter()
            .filter_map(|c| if let PlotCommand::Line { x, y } = c { Some((*x, *y)) } else { None })
            .collect();
        assert_eq!(lines.len(), 16);

        let mid = lines[lines.len() / 2 - 1];
        assert!((mid.0 - 50.0).abs() < 0.5);
        assert!((mid.1 - 3.0).abs() < 0.5);
    }

    #[test]
    fn empty_svg_yields_no_commands() {
        let svg = r#"<svg viewBox="0 0 10 10"></svg>"#;
        let cmds = svg_to_commands(svg, CompileOptions::default()).unwrap();
        assert!(cmds.is_empty());
    }

    #[test]
    fn unsupported_command_is_rejected() {
        let svg = r#"<svg><path d="M0,0 B1,1"/></svg>"#;
        let err = svg_to_commands(svg, CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedPathCommand('B')));
    }

    #[test]
    fn all_points_stay_within_safety_margin() {
        let svg = r#"<svg viewBox="0 0 100 100"><rect x="-50" y="-50" width="500" height="500"/></svg>"#;
        let options = CompileOptions { canvas_w: 100.0, canvas_h: 100.0, safety_margin: 3.0, optimize: true };
        let cmds = svg_to_commands(svg, options).unwrap();
        for cmd in &cmds {
            if let PlotCommand::Move { x, y } | PlotCommand::Line { x, y } = cmd {
                assert!(*x >= 3.0 - 1e-9 && *x <= 97.0 + 1e-9);
                assert!(*y >= 3.0 - 1e-9 && *y <= 97.0 + 1e-9);
            }
        }
    }
}
