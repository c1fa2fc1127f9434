//! Polygon geometry for traced well contours.

/// Signed shoelace area; positive for counter-clockwise in a y-up frame.
fn signed_area(points: &[[i32; 2]]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut s = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        s += a[0] as f64 * b[1] as f64 - b[0] as f64 * a[1] as f64;
    }
    0.5 * s
}

pub fn polygon_area(points: &[[i32; 2]]) -> f64 {
    signed_area(points).abs()
}

/// Area centroid of the polygon; vertex mean when the area vanishes.
pub fn polygon_centroid(points: &[[i32; 2]]) -> [f64; 2] {
    if points.is_empty() {
        return [f64::NAN, f64::NAN];
    }
    let a = signed_area(points);
    if a.abs() < 1e-9 {
        let n = points.len() as f64;
        let sx: f64 = points.iter().map(|p| p[0] as f64).sum();
        let sy: f64 = points.iter().map(|p| p[1] as f64).sum();
        return [sx / n, sy / n];
    }
    let n = points.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let (x0, y0) = (points[i][0] as f64, points[i][1] as f64);
        let (x1, y1) = (points[(i + 1) % n][0] as f64, points[(i + 1) % n][1] as f64);
        let cross = x0 * y1 - x1 * y0;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    [cx / (6.0 * a), cy / (6.0 * a)]
}

/// Inclusive bounding box `[x_min, y_min, x_max, y_max]`.
pub fn polygon_bbox(points: &[[i32; 2]]) -> Option<[i32; 4]> {
    let first = points.first()?;
    let mut b = [first[0], first[1], first[0], first[1]];
    for p in points {
        b[0] = b[0].min(p[0]);
        b[1] = b[1].min(p[1]);
        b[2] = b[2].max(p[0]);
        b[3] = b[3].max(p[1]);
    }
    Some(b)
}

/// Even-odd point-in-polygon test.
pub fn point_in_polygon(points: &[[i32; 2]], x: f64, y: f64) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (points[i][0] as f64, points[i][1] as f64);
        let (xj, yj) = (points[j][0] as f64, points[j][1] as f64);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Traced hole contour with its derived geometry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub points: Vec<[i32; 2]>,
    pub area: f64,
    pub centroid: [f64; 2],
    pub bbox: [i32; 4],
}

impl Candidate {
    pub(crate) fn from_points(points: Vec<[i32; 2]>) -> Option<Self> {
        let bbox = polygon_bbox(&points)?;
        let area = polygon_area(&points);
        let centroid = polygon_centroid(&points);
        Some(Self {
            points,
            area,
            centroid,
            bbox,
        })
    }

    /// Bounding box width over height, in pixel-center units.
    pub(crate) fn aspect(&self) -> f64 {
        let w = (self.bbox[2] - self.bbox[0] + 1) as f64;
        let h = (self.bbox[3] - self.bbox[1] + 1) as f64;
        w / h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<[i32; 2]> {
        vec![[2, 2], [12, 2], [12, 8], [2, 8]]
    }

    #[test]
    fn rectangle_area_and_centroid() {
        let pts = square();
        assert_relative_eq!(polygon_area(&pts), 60.0);
        let c = polygon_centroid(&pts);
        assert_relative_eq!(c[0], 7.0);
        assert_relative_eq!(c[1], 5.0);
        assert_eq!(polygon_bbox(&pts), Some([2, 2, 12, 8]));
    }

    #[test]
    fn orientation_does_not_change_area() {
        let mut pts = square();
        pts.reverse();
        assert_relative_eq!(polygon_area(&pts), 60.0);
        let c = polygon_centroid(&pts);
        assert_relative_eq!(c[0], 7.0);
    }

    #[test]
    fn even_odd_inside_test() {
        let pts = square();
        assert!(point_in_polygon(&pts, 7.0, 5.0));
        assert!(!point_in_polygon(&pts, 1.0, 5.0));
        assert!(!point_in_polygon(&pts, 7.0, 9.5));
    }

    #[test]
    fn degenerate_contours() {
        let line = vec![[0, 0], [4, 0]];
        assert_eq!(polygon_area(&line), 0.0);
        assert_eq!(polygon_centroid(&line), [2.0, 0.0]);
        assert!(Candidate::from_points(Vec::new()).is_none());
    }
}
