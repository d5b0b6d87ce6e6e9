pub mod ramp;
pub mod types;

pub use ramp::RampTable;
pub use types::*;
