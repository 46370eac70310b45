//! Parses an SVG path `d` attribute into flattened subpaths (§4.3 steps 2–3).
//!
//! Curve commands are flattened inline as they're parsed rather than kept as
//! a separate AST stage — the compiler never needs the unflattened curve
//! again, so there's no value in a round-trip representation.

use super::error::CompileError;

/// One flattened subpath: an ordered list of drawing-space points.
#[derive(Clone, Debug, PartialEq)]
pub struct Subpath {
    pub points: Vec<(f64, f64)>,
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            self.chars.next();
        }
    }

    /// Peeks the next non-separator char without consuming it.
    fn peek_significant(&mut self) -> Option<char> {
        self.skip_separators();
        self.chars.peek().copied()
    }

    fn next_is_command_letter(&mut self) -> bool {
        matches!(self.peek_significant(), Some(c) if c.is_ascii_alphabetic())
    }

    fn read_command(&mut self) -> Option<char> {
        self.skip_separators();
        self.chars.next()
    }

    /// Reads one floating-point number (SVG path numbers allow no space
    /// between a number and a following `-` sign, e.g. `10-5`).
    fn read_number(&mut self) -> Result<f64, CompileError> {
        self.skip_separators();
        let mut tok = String::new();
        if matches!(self.chars.peek(), Some('+') | Some('-')) {
            tok.push(self.chars.next().unwrap());
        }
        let mut seen_dot = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                tok.push(c);
                self.chars.next();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                tok.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if matches!(self.chars.peek(), Some('e') | Some('E')) {
            tok.push(self.chars.next().unwrap());
            if matches!(self.chars.peek(), Some('+') | Some('-')) {
                tok.push(self.chars.next().unwrap());
            }
            while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
                tok.push(self.chars.next().unwrap());
            }
        }
        tok.parse()
            .map_err(|_| CompileError::InvalidSvg(format!("bad number near '{tok}'")))
    }

    /// Reads a single `0`/`1` flag (arc large-arc/sweep flags, which need no
    /// separator from the next token).
    fn read_flag(&mut self) -> Result<bool, CompileError> {
        self.skip_separators();
        match self.chars.next() {
            Some('0') => Ok(false),
            Some('1') => Ok(true),
            other => Err(CompileError::InvalidSvg(format!(
                "expected arc flag 0/1, got {other:?}"
            ))),
        }
    }
}

fn cubic_point(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), t: f64) -> (f64, f64) {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    (
        a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0,
        a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1,
    )
}

fn quad_point(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), t: f64) -> (f64, f64) {
    let mt = 1.0 - t;
    let a = mt * mt;
    let b = 2.0 * mt * t;
    let c = t * t;
    (a * p0.0 + b * p1.0 + c * p2.0, a * p0.1 + b * p1.1 + c * p2.1)
}

/// Cubic and quadratic curves are sampled at 9 points (t = 0..1 in 8 steps,
/// §4.3 step 3).
const CURVE_SAMPLES: usize = 9;

fn flatten_cubic(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> Vec<(f64, f64)> {
    (1..CURVE_SAMPLES)
        .map(|i| cubic_point(p0, p1, p2, p3, i as f64 / (CURVE_SAMPLES - 1) as f64))
        .collect()
}

fn flatten_quad(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64)) -> Vec<(f64, f64)> {
    (1..CURVE_SAMPLES)
        .map(|i| quad_point(p0, p1, p2, i as f64 / (CURVE_SAMPLES - 1) as f64))
        .collect()
}

/// Parses a `d` attribute into flattened subpaths. Supports
/// M/m L/l H/h V/v Z/z C/c S/s Q/q T/t A/a (§4.3 step 2).
pub fn parse_path_data(d: &str) -> Result<Vec<Subpath>, CompileError> {
    let mut scanner = Scanner::new(d);
    let mut subpaths: Vec<Subpath> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    let mut start = (0.0_f64, 0.0_f64);

    let finish_subpath = |current: &mut Vec<(f64, f64)>, subpaths: &mut Vec<Subpath>| {
        if current.len() > 1 {
            subpaths.push(Subpath {
                points: std::mem::take(current),
            });
        } else {
            current.clear();
        }
    };

    while let Some(cmd) = scanner.read_command() {
        let relative = cmd.is_ascii_lowercase();
        let upper = cmd.to_ascii_uppercase();

        match upper {
            'M' => {
                finish_subpath(&mut current, &mut subpaths);
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                cx = if relative { cx + x } else { x };
                cy = if relative { cy + y } else { y };
                start = (cx, cy);
                current.push((cx, cy));
                // Additional coordinate pairs after the first imply lineto.
                while !scanner.next_is_command_letter() && scanner.peek_significant().is_some() {
                    let x = scanner.read_number()?;
                    let y = scanner.read_number()?;
                    cx = if relative { cx + x } else { x };
                    cy = if relative { cy + y } else { y };
                    current.push((cx, cy));
                }
            }
            'L' => loop {
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                cx = if relative { cx + x } else { x };
                cy = if relative { cy + y } else { y };
                current.push((cx, cy));
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'H' => loop {
                let x = scanner.read_number()?;
                cx = if relative { cx + x } else { x };
                current.push((cx, cy));
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'V' => loop {
                let y = scanner.read_number()?;
                cy = if relative { cy + y } else { y };
                current.push((cx, cy));
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'Z' => {
                if (cx, cy) != start {
                    current.push(start);
                }
                cx = start.0;
                cy = start.1;
                finish_subpath(&mut current, &mut subpaths);
                current.push(start);
            }
            'C' => loop {
                let x1 = scanner.read_number()?;
                let y1 = scanner.read_number()?;
                let x2 = scanner.read_number()?;
                let y2 = scanner.read_number()?;
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                let (p1, p2, p3) = if relative {
                    ((cx + x1, cy + y1), (cx + x2, cy + y2), (cx + x, cy + y))
                } else {
                    ((x1, y1), (x2, y2), (x, y))
                };
                current.extend(flatten_cubic((cx, cy), p1, p2, p3));
                cx = p3.0;
                cy = p3.1;
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'S' => loop {
                let x2 = scanner.read_number()?;
                let y2 = scanner.read_number()?;
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                let (p2, p3) = if relative {
                    ((cx + x2, cy + y2), (cx + x, cy + y))
                } else {
                    ((x2, y2), (x, y))
                };
                // Uses the current point as the implicit first control point
                // rather than the true reflection of the previous curve's
                // control point (documented deviation, see path compiler notes).
                current.extend(flatten_cubic((cx, cy), (cx, cy), p2, p3));
                cx = p3.0;
                cy = p3.1;
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'Q' => loop {
                let x1 = scanner.read_number()?;
                let y1 = scanner.read_number()?;
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                let (p1, p2) = if relative {
                    ((cx + x1, cy + y1), (cx + x, cy + y))
                } else {
                    ((x1, y1), (x, y))
                };
                current.extend(flatten_quad((cx, cy), p1, p2));
                cx = p2.0;
                cy = p2.1;
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'T' => loop {
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                let p2 = if relative { (cx + x, cy + y) } else { (x, y) };
                current.extend(flatten_quad((cx, cy), (cx, cy), p2));
                cx = p2.0;
                cy = p2.1;
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            'A' => loop {
                let rx = scanner.read_number()?;
                let ry = scanner.read_number()?;
                let x_axis_rotation = scanner.read_number()?;
                let large_arc = scanner.read_flag()?;
                let sweep = scanner.read_flag()?;
                let x = scanner.read_number()?;
                let y = scanner.read_number()?;
                let end = if relative { (cx + x, cy + y) } else { (x, y) };
                let points = super::arc::flatten_arc(
                    (cx, cy),
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    end,
                );
                current.extend(points);
                cx = end.0;
                cy = end.1;
                if scanner.next_is_command_letter() || scanner.peek_significant().is_none() {
                    break;
                }
            },
            other => return Err(CompileError::UnsupportedPathCommand(other)),
        }
    }

    finish_subpath(&mut current, &mut subpaths);
    Ok(subpaths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!((a.0 - b.0).abs() < 1e-6, "{:?} != {:?}", a, b);
        assert!((a.1 - b.1).abs() < 1e-6, "{:?} != {:?}", a, b);
    }

    #[test]
    fn parses_simple_line() {
        let subs = parse_path_data("M10,10 L20,20").unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].points, vec![(10.0, 10.0), (20.0, 20.0)]);
    }

    #[test]
    fn implicit_lineto_after_moveto() {
        let subs = parse_path_data("M0,0 10,10 20,0").unwrap();
        assert_eq!(subs[0].points, vec![(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]);
    }

    #[test]
    fn relative_lineto_accumulates() {
        let subs = parse_path_data("M0,0 l10,0 l0,10").unwrap();
        assert_eq!(subs[0].points, vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    }

    #[test]
    fn horizontal_and_vertical() {
        let subs = parse_path_data("M0,0 H10 V10").unwrap();
        assert_eq!(subs[0].points, vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    }

    #[test]
    fn closepath_returns_to_start() {
        let subs = parse_path_data("M0,0 L10,0 L10,10 Z").unwrap();
        assert_close(*subs[0].points.last().unwrap(), (0.0, 0.0));
    }

    #[test]
    fn cubic_bezier_has_nine_points() {
        let subs = parse_path_data("M10,10 C 10,90 90,90 90,10").unwrap();
        assert_eq!(subs[0].points.len(), 9);
        assert_close(subs[0].points[0], (10.0, 10.0));
        assert_close(*subs[0].points.last().unwrap(), (90.0, 10.0));
    }

    #[test]
    fn arc_flattens_to_seventeen_points() {
        let subs = parse_path_data("M0,50 A50,50 0 0 1 100,50").unwrap();
        assert_eq!(subs[0].points.len(), 17);
    }

    #[test]
    fn unsupported_command_is_rejected() {
        let err = parse_path_data("M0,0 B10,10").unwrap_err();
        assert_eq!(err, CompileError::UnsupportedPathCommand('B'));
    }
}
