// Domain layer: request/result models and ports (interfaces).

pub mod model;
pub mod ports;
