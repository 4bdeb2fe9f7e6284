use crate::types::Coordinate;

pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Great-circle distance in miles using the spherical law of cosines.
pub fn distance_miles(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }

    let phi1 = (90.0 - from.latitude).to_radians();
    let phi2 = (90.0 - to.latitude).to_radians();
    let theta1 = from.longitude.to_radians();
    let theta2 = to.longitude.to_radians();

    // Rounding can push the cosine just past +/-1 for near or antipodal points.
    let cos = (phi1.sin() * phi2.sin() * (theta1 - theta2).cos() + phi1.cos() * phi2.cos())
        .clamp(-1.0, 1.0);

    cos.acos() * EARTH_RADIUS_MILES
}
