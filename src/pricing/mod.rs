use crate::models::ride::VehicleClass;

const AVERAGE_SPEED_KMPH: f64 = 40.0;

/// (base fare, per-km rate) in currency-agnostic units.
fn rate_table(class: VehicleClass) -> (f64, f64) {
    match class {
        VehicleClass::Bike => (15.0, 8.0),
        VehicleClass::Auto => (25.0, 12.0),
        VehicleClass::Sedan => (40.0, 15.0),
        VehicleClass::Suv => (60.0, 20.0),
        VehicleClass::Premium => (80.0, 25.0),
    }
}

pub fn estimate_fare(class: VehicleClass, distance_meters: f64) -> i64 {
    let (base, per_km) = rate_table(class);
    (base + per_km * (distance_meters / 1000.0)).round() as i64
}

pub fn estimate_duration_minutes(distance_meters: f64) -> i64 {
    // multiply before dividing so whole-minute distances stay exact
    (distance_meters * 60.0 / (AVERAGE_SPEED_KMPH * 1000.0)).ceil() as i64
}
