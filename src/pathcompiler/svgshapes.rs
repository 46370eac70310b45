//! Extracts drawable primitives from raw SVG text and synthesizes path-data
//! strings for the non-`path` shapes (§4.3 step 1).
//!
//! This is a minimal, purpose-built scanner rather than a general XML
//! parser: it only needs to find a handful of tag names and read their
//! attributes, and the SVGs this compiler consumes are machine-generated
//! (never hand-authored with exotic markup).

use super::error::CompileError;
use std::collections::HashMap;

/// Intrinsic document dimensions used to derive the canvas transform
/// (§4.3 step 4).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DocumentDims {
    pub view_box: Option<(f64, f64, f64, f64)>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Finds the attribute text of every occurrence of `<name ...>` (or
/// self-closing `<name .../>`), matching only whole tag names.
fn find_tag_attrs<'a>(svg: &'a str, name: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let needle = format!("<{name}");
    let bytes = svg.as_bytes();
    let mut search_from = 0;
    while let Some(rel) = svg[search_from..].find(&needle) {
        let start = search_from + rel;
        let after = start + needle.len();
        let boundary_ok = bytes
            .get(after)
            .map(|&b| b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' || b == b'/' || b == b'>')
            .unwrap_or(false);
        if boundary_ok {
            if let Some(end_rel) = svg[after..].find('>') {
                let end = after + end_rel;
                out.push(&svg[after..end]);
                search_from = end + 1;
                continue;
            } else {
                break;
            }
        }
        search_from = after;
    }
    out
}

/// Parses `key="value"` pairs out of a tag's attribute text.
fn parse_attrs(attrs: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut chars = attrs.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !c.is_ascii_alphabetic() {
            continue;
        }
        let key_start = i;
        let mut key_end = i + c.len_utf8();
        while let Some(&(j, c2)) = chars.peek() {
            if c2.is_ascii_alphanumeric() || c2 == '-' || c2 == '_' || c2 == ':' {
                key_end = j + c2.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let key = &attrs[key_start..key_end];
        // Skip to '=' then opening quote.
        let rest = &attrs[key_end..];
        let Some(eq) = rest.find('=') else { continue };
        let after_eq = &rest[eq + 1..];
        let quote_idx = after_eq.find(|c: char| c == '"' || c == '\'');
        let Some(qi) = quote_idx else { continue };
        let quote_char = after_eq.as_bytes()[qi] as char;
        let value_start = qi + 1;
        let Some(value_end_rel) = after_eq[value_start..].find(quote_char) else {
            continue;
        };
        let value = &after_eq[value_start..value_start + value_end_rel];
        map.insert(key.to_string(), value.to_string());
        // Advance the outer char iterator past the closing quote so stray
        // letters inside the value (e.g. a path's `d="M0,0 L10,10"`) aren't
        // mistaken for the start of another attribute key.
        let consumed = key_end + eq + 1 + value_start + value_end_rel + 1;
        while let Some(&(j, _)) = chars.peek() {
            if j < consumed {
                chars.next();
            } else {
                break;
            }
        }
    }
    map
}

fn attr_f64(attrs: &HashMap<String, String>, key: &str, default: f64) -> f64 {
    attrs
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses the root `<svg>` tag's `viewBox`/`width`/`height` (§4.3 step 4).
pub fn parse_document_dims(svg: &str) -> DocumentDims {
    let Some(attrs_text) = find_tag_attrs(svg, "svg").into_iter().next() else {
        return DocumentDims::default();
    };
    let attrs = parse_attrs(attrs_text);
    let view_box = attrs.get("viewBox").and_then(|v| {
        let parts: Vec<f64> = v
            .split_whitespace()
            .flat_map(|s| s.split(','))
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() == 4 {
            Some((parts[0], parts[1], parts[2], parts[3]))
        } else {
            None
        }
    });
    DocumentDims {
        view_box,
        width: attrs.get("width").and_then(|v| strip_unit(v).parse().ok()),
        height: attrs.get("height").and_then(|v| strip_unit(v).parse().ok()),
    }
}

fn strip_unit(s: &str) -> &str {
    s.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
}

/// Extracts every drawable shape in document order, synthesizing a path-data
/// string for each (§4.3 step 1).
pub fn extract_path_data_strings(svg: &str) -> Result<Vec<String>, CompileError> {
    if !svg.contains("<svg") {
        return Err(CompileError::InvalidSvg("no <svg> root element".into()));
    }
    let mut shapes: Vec<(usize, String)> = Vec::new();

    for name in ["path", "line", "polyline", "polygon", "rect", "circle", "ellipse"] {
        let needle = format!("<{name}");
        let mut search_from = 0;
        for attrs_text in find_tag_attrs(svg, name) {
            let pos = svg[search_from..].find(&needle).map(|p| p + search_from).unwrap_or(0);
            search_from = pos + needle.len();
            let attrs = parse_attrs(attrs_text);
            if let Some(d) = synthesize_path_data(name, &attrs) {
                shapes.push((pos, d));
            }
        }
    }

    shapes.sort_by_key(|(pos, _)| *pos);
    Ok(shapes.into_iter().map(|(_, d)| d).collect())
}

fn synthesize_path_data(tag: &str, attrs: &HashMap<String, String>) -> Option<String> {
    match tag {
        "path" => attrs.get("d").cloned(),
        "line" => {
            let x1 = attr_f64(attrs, "x1", 0.0);
            let y1 = attr_f64(attrs, "y1", 0.0);
            let x2 = attr_f64(attrs, "x2", 0.0);
            let y2 = attr_f64(attrs, "y2", 0.0);
            Some(format!("M{x1},{y1} L{x2},{y2}"))
        }
        "polyline" | "polygon" => {
            let points = attrs.get("points")?;
            let coords: Vec<f64> = points
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            if coords.len() < 4 {
                return None;
            }
            let mut d = format!("M{},{}", coords[0], coords[1]);
            let mut i = 2;
            while i + 1 < coords.len() {
                d.push_str(&format!(" L{},{}", coords[i], coords[i + 1]));
                i += 2;
            }
            if tag == "polygon" {
                d.push_str(" Z");
            }
            Some(d)
        }
        "rect" => {
            let x = attr_f64(attrs, "x", 0.0);
            let y = attr_f64(attrs, "y", 0.0);
            let w = attr_f64(attrs, "width", 0.0);
            let h = attr_f64(attrs, "height", 0.0);
            if w <= 0.0 || h <= 0.0 {
                return None;
            }
            Some(format!(
                "M{x},{y} L{},{y} L{},{} L{x},{} Z",
                x + w,
                x + w,
                y + h,
                y + h
            ))
        }
        "circle" => {
            let cx = attr_f64(attrs, "cx", 0.0);
            let cy = attr_f64(attrs, "cy", 0.0);
            let r = attr_f64(attrs, "r", 0.0);
            if r <= 0.0 {
                return None;
            }
            Some(format!(
                "M{},{cy} A{r},{r} 0 1 0 {},{cy} A{r},{r} 0 1 0 {},{cy} Z",
                cx - r,
                cx + r,
                cx - r
            ))
        }
        "ellipse" => {
            let cx = attr_f64(attrs, "cx", 0.0);
            let cy = attr_f64(attrs, "cy", 0.0);
            let rx = attr_f64(attrs, "rx", 0.0);
            let ry = attr_f64(attrs, "ry", 0.0);
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            Some(format!(
                "M{},{cy} A{rx},{ry} 0 1 0 {},{cy} A{rx},{ry} 0 1 0 {},{cy} Z",
                cx - rx,
                cx + rx,
                cx - rx
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_path() {
        let svg = r#"<svg viewBox="0 0 100 100"><path d="M0,0 L10,10"/></svg>"#;
        let shapes = extract_path_data_strings(svg).unwrap();
        assert_eq!(shapes, vec!["M0,0 L10,10".to_string()]);
    }

    #[test]
    fn extracts_in_document_order() {
        let svg = r#"<svg><rect x="0" y="0" width="10" height="10"/><line x1="0" y1="0" x2="5" y2="5"/></svg>"#;
        let shapes = extract_path_data_strings(svg).unwrap();
        assert_eq!(shapes.len(), 2);
        assert!(shapes[0].starts_with("M0,0"));
        assert!(shapes[1].starts_with("M0,0 L5,5"));
    }

    #[test]
    fn synthesizes_polygon_with_close() {
        let svg = r#"<svg><polygon points="0,0 10,0 10,10"/></svg>"#;
        let shapes = extract_path_data_strings(svg).unwrap();
        assert_eq!(shapes[0], "M0,0 L10,0 L10,10 Z");
    }

    #[test]
    fn parses_view_box() {
        let dims = parse_document_dims(r#"<svg viewBox="0 0 210 297" width="210mm" height="297mm">"#);
        assert_eq!(dims.view_box, Some((0.0, 0.0, 210.0, 297.0)));
        assert_eq!(dims.width, Some(210.0));
        assert_eq!(dims.height, Some(297.0));
    }

    #[test]
    fn rejects_non_svg_input() {
        let err = extract_path_data_strings("<html></html>").unwrap_err();
        assert!(matches!(err, CompileError::InvalidSvg(_)));
    }
}
