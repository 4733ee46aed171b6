//! Deterministic ranked-candidate generation.

use hashbrown::HashSet;

use crate::device::ui::{Bounds, TapPoint, UiSnapshot};

/// Tuning for candidate generation and execution.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Grid dimension for the generated region points (N×N).
    pub grid_size: u32,
    /// Wait after each tap before re-reading the device state.
    pub settle_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            grid_size: 3,
            settle_ms: 500,
        }
    }
}

/// One candidate interaction point with its priority rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAttempt {
    /// Priority rank, 1 is tried first.
    pub rank: u32,
    /// Human-readable candidate description.
    pub label: String,
    /// Screen point to tap.
    pub point: TapPoint,
}

/// Produces the ranked candidate list for clearing an ambiguous UI state.
///
/// Priority order: centers of exact `goal_label` text matches in document
/// order, then the center of the smallest element enclosing the best match,
/// then an N×N grid inside the best-matching region. Duplicate points are
/// dropped. Output is deterministic for a given snapshot and label.
pub fn resolve_ambiguity(
    snapshot: &UiSnapshot,
    goal_label: &str,
    grid_size: u32,
) -> Vec<FallbackAttempt> {
    let mut out: Vec<FallbackAttempt> = Vec::new();
    let mut seen: HashSet<TapPoint> = HashSet::new();
    let mut push = |label: String, point: TapPoint, out: &mut Vec<FallbackAttempt>| {
        if seen.insert(point) {
            out.push(FallbackAttempt {
                rank: out.len() as u32 + 1,
                label,
                point,
            });
        }
    };

    let exact: Vec<&Bounds> = snapshot
        .nodes()
        .iter()
        .filter(|n| n.text == goal_label)
        .map(|n| &n.bounds)
        .collect();

    for bounds in &exact {
        push(
            format!("\"{goal_label}\" label center"),
            bounds.center(),
            &mut out,
        );
    }

    // Best-matching region: the exact match when present, otherwise the
    // first element mentioning the goal at all.
    let best: Option<Bounds> = exact.first().copied().copied().or_else(|| {
        snapshot
            .nodes()
            .iter()
            .find(|n| n.text.contains(goal_label))
            .map(|n| n.bounds)
    });

    let Some(best) = best else {
        return out;
    };

    let container = snapshot
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, n)| n.bounds.contains(&best) && n.bounds.area() > best.area())
        .min_by_key(|(idx, n)| (n.bounds.area(), *idx))
        .map(|(_, n)| n.bounds);

    if let Some(container) = container {
        push("enclosing container center".to_string(), container.center(), &mut out);
    }

    let region = container.unwrap_or(best);
    let n = grid_size.max(1) as i32;
    for row in 0..n {
        for col in 0..n {
            let point = TapPoint {
                x: region.x1 + (region.x2 - region.x1) * (col + 1) / (n + 1),
                y: region.y1 + (region.y2 - region.y1) * (row + 1) / (n + 1),
            };
            push(format!("grid[{row},{col}]"), point, &mut out);
        }
    }

    out
}
