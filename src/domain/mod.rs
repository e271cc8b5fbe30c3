// Domain layer: records and ports. No HTTP or storage details here.

pub mod model;
pub mod ports;
