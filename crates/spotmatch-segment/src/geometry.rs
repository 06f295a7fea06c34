use std::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by monotone chain, counter-clockwise in y-up terms, without
/// collinear points.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Oriented rectangle. `width` runs along `(cos angle, sin angle)` in image
/// coordinates, `height` along the perpendicular; `angle` is in degrees
/// within `[-90, 0)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// The four corners, each opposite pair mirrored through the centre.
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let b = sin * 0.5;
        let a = cos * 0.5;
        let (cx, cy, w, h) = (self.center.x, self.center.y, self.width, self.height);
        let p0 = Point::new(cx - a * w + b * h, cy - b * w - a * h);
        let p1 = Point::new(cx + a * w + b * h, cy + b * w - a * h);
        let p2 = Point::new(2.0 * cx - p0.x, 2.0 * cy - p0.y);
        let p3 = Point::new(2.0 * cx - p1.x, 2.0 * cy - p1.y);
        [p0, p1, p2, p3]
    }
}

/// Smallest-area rectangle enclosing `points`, by rotating one side of the
/// rectangle onto each convex hull edge. Returns `None` for an empty input.
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return None,
        1 => {
            return Some(RotatedRect {
                center: hull[0],
                width: 0.0,
                height: 0.0,
                angle: -90.0,
            });
        }
        _ => {}
    }

    let mut best: Option<(f64, RotatedRect)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = (dx / len, dy / len);
        let (vx, vy) = (-uy, ux);

        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for p in &hull {
            let pu = p.x * ux + p.y * uy;
            let pv = p.x * vx + p.y * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }
        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;
        if best.as_ref().is_some_and(|(best_area, _)| *best_area <= area) {
            continue;
        }
        let mid_u = (min_u + max_u) * 0.5;
        let mid_v = (min_v + max_v) * 0.5;
        let center = Point::new(mid_u * ux + mid_v * vx, mid_u * uy + mid_v * vy);
        let rect = RotatedRect {
            center,
            width,
            height,
            angle: uy.atan2(ux).to_degrees(),
        };
        best = Some((area, rect));
    }

    best.map(|(_, rect)| canonical_angle(rect))
}

/// Folds the angle into `[-90, 0)`, swapping sides on every quarter turn.
fn canonical_angle(mut rect: RotatedRect) -> RotatedRect {
    while rect.angle >= 0.0 {
        rect.angle -= 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    while rect.angle < -90.0 {
        rect.angle += 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn hull_drops_interior_points() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(2.0, 2.0)));
    }

    #[test]
    fn axis_aligned_box_reports_minus_ninety() {
        let points = [
            Point::new(10.0, 20.0),
            Point::new(50.0, 20.0),
            Point::new(50.0, 40.0),
            Point::new(10.0, 40.0),
        ];
        let rect = min_area_rect(&points).unwrap();
        assert!(close(rect.center.x, 30.0));
        assert!(close(rect.center.y, 30.0));
        assert!(close(rect.area(), 800.0));
        assert!(rect.angle >= -90.0 && rect.angle < 0.0);
    }

    #[test]
    fn tilted_box_is_recovered() {
        let rect = RotatedRect {
            center: Point::new(100.0, 80.0),
            width: 60.0,
            height: 20.0,
            angle: -30.0,
        };
        let fitted = min_area_rect(&rect.corners()).unwrap();
        assert!(close(fitted.area(), 1200.0));
        assert!(close(fitted.center.x, 100.0));
        assert!(close(fitted.center.y, 80.0));
        // whichever hull edge wins, folding settles on the same description
        assert!(close(fitted.angle, -30.0));
        assert!(close(fitted.width, 60.0));
        assert!(close(fitted.height, 20.0));
    }

    #[test]
    fn corners_surround_center() {
        let rect = RotatedRect {
            center: Point::new(5.0, 5.0),
            width: 4.0,
            height: 2.0,
            angle: -90.0,
        };
        let corners = rect.corners();
        let xs: Vec<f64> = corners.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = corners.iter().map(|p| p.y).collect();
        let span_x = xs.iter().cloned().fold(f64::MIN, f64::max)
            - xs.iter().cloned().fold(f64::MAX, f64::min);
        let span_y = ys.iter().cloned().fold(f64::MIN, f64::max)
            - ys.iter().cloned().fold(f64::MAX, f64::min);
        assert!(close(span_x, 2.0));
        assert!(close(span_y, 4.0));
    }

    #[test]
    fn empty_input_has_no_rect() {
        assert!(min_area_rect(&[]).is_none());
    }
}
