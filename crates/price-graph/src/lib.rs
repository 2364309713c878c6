// Library entry point for price-graph

pub mod config;
pub mod engine;
pub mod graph;
pub mod num;
pub mod oracle;
pub mod persistence;
pub mod propagation;
pub mod types;
