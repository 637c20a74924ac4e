pub mod coerce;
pub mod crypto;
pub mod token;
