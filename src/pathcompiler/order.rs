//! Greedy nearest-neighbor path ordering to minimize pen-up travel (§4.3
//! step 6).

use super::pathdata::Subpath;

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Orders `paths` starting from `origin`, greedily picking the remaining
/// path whose nearer endpoint is closest to the current pen position.
/// Reverses a path's point list when its tail is closer than its head.
/// Ties (equal distance) are broken by first-encountered order.
///
/// Empty paths are dropped; paths with a single point are kept as-is (both
/// endpoints coincide).
pub fn order_paths(paths: Vec<Subpath>, origin: (f64, f64)) -> Vec<Subpath> {
    let mut remaining: Vec<Subpath> = paths.into_iter().filter(|p| !p.points.is_empty()).collect();
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current = origin;

    while !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_reverse = false;
        let mut best_dist = f64::INFINITY;

        for (i, path) in remaining.iter().enumerate() {
            let head = path.points[0];
            let tail = *path.points.last().unwrap();
            let d_head = dist(current, head);
            let d_tail = dist(current, tail);

            if d_head < best_dist {
                best_dist = d_head;
                best_idx = i;
                best_reverse = false;
            }
            if d_tail < best_dist {
                best_dist = d_tail;
                best_idx = i;
                best_reverse = true;
            }
        }

        let mut chosen = remaining.remove(best_idx);
        if best_reverse {
            chosen.points.reverse();
        }
        current = *chosen.points.last().unwrap();
        ordered.push(chosen);
    }

    ordered
}
