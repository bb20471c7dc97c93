// Land plot capture surface: data model, geometry, state machine, rendering

pub mod capture;
pub mod color;
pub mod geometry;
pub mod render;
pub mod summary;
pub mod types;
