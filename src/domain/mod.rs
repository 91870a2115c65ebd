// Domain layer: configuration tree, runtime evidence, resolved records and ports.

pub mod model;
pub mod ports;
pub mod runtime;
pub mod tree;
