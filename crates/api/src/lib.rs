//! HTTP surface: dispatcher trigger, subscription management and test pushes.

pub mod middleware;
pub mod routes;
pub mod state;
