// Application layer: operator demonstrations over small fixed data sets.

pub mod backpressure;
pub mod fruits;
pub mod hot_cold;
