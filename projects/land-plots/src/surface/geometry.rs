use crate::surface::types::Point;
use geo::{Area, Contains};
use geo_types::{LineString, Point as GeoPoint, Polygon};

/// Convert surface points to a geo_types Polygon (closed implicitly)
fn to_geo_polygon(points: &[Point]) -> Polygon<f64> {
    let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(LineString::from(coords), vec![])
}

/// Shoelace area of the polygon described by `points`, wrapping last to first.
/// Fewer than three points have no area.
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    to_geo_polygon(points).unsigned_area()
}

/// Arithmetic mean of the vertices. This is where plot labels are placed,
/// not the area centroid.
pub fn vertex_centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Point-in-polygon using geo crate. Points on the boundary are outside.
pub fn contains_point(polygon: &[Point], point: Point) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    to_geo_polygon(polygon).contains(&GeoPoint::new(point.x, point.y))
}
