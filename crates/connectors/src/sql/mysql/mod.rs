pub mod destination;
pub mod params;
pub mod row;
pub mod source;
