pub mod coerce;
pub mod schema;
