use nxui_core::{Position, Rect};

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: u32,
    origin: i32,
}

fn consider(best: &mut Option<Candidate>, edge: i32, target: i32, origin: i32, threshold: u32) {
    let distance = edge.abs_diff(target);
    if distance > threshold {
        return;
    }
    if best.map_or(true, |current| distance < current.distance) {
        *best = Some(Candidate { distance, origin });
    }
}

/// Snap a dragged rectangle to the work area or to nearby surfaces.
///
/// Each axis snaps at most once, to the closest edge pair within
/// `threshold`. Neighbours only count when their bounds, grown by the
/// threshold, overlap the dragged rectangle.
pub fn snap_rect(dragged: Rect, work_area: Rect, others: &[Rect], threshold: u32) -> Position {
    let t = threshold;
    let w = i32::try_from(dragged.width).unwrap_or(i32::MAX);
    let h = i32::try_from(dragged.height).unwrap_or(i32::MAX);
    let mut best_x = None;
    let mut best_y = None;

    consider(&mut best_x, dragged.left(), work_area.left(), work_area.left(), t);
    consider(&mut best_x, dragged.right(), work_area.right(), work_area.right().saturating_sub(w), t);
    consider(&mut best_y, dragged.top(), work_area.top(), work_area.top(), t);
    consider(&mut best_y, dragged.bottom(), work_area.bottom(), work_area.bottom().saturating_sub(h), t);

    for other in others
        .iter()
        .filter(|other| other.inflate(threshold).intersects(&dragged))
    {
        consider(&mut best_x, dragged.left(), other.left(), other.left(), t);
        consider(&mut best_x, dragged.left(), other.right(), other.right(), t);
        consider(&mut best_x, dragged.right(), other.right(), other.right().saturating_sub(w), t);
        consider(&mut best_x, dragged.right(), other.left(), other.left().saturating_sub(w), t);

        consider(&mut best_y, dragged.top(), other.top(), other.top(), t);
        consider(&mut best_y, dragged.top(), other.bottom(), other.bottom(), t);
        consider(&mut best_y, dragged.bottom(), other.bottom(), other.bottom().saturating_sub(h), t);
        consider(&mut best_y, dragged.bottom(), other.top(), other.top().saturating_sub(h), t);
    }

    Position::new(
        best_x.map_or(dragged.x, |c| c.origin),
        best_y.map_or(dragged.y, |c| c.origin),
    )
}
