mod bounding_box;
mod date_range;
mod mmsi;
mod quality;
mod report;
mod vessel;

pub use bounding_box::*;
pub use date_range::*;
pub use mmsi::*;
pub use quality::*;
pub use report::*;
pub use vessel::*;
