pub mod config;
pub mod evaluation;
pub mod grid_sweep;
pub mod heuristic;
pub mod image_mse;
pub mod plot;
pub mod renderer;
pub mod results;
pub mod table;

pub use heuristic::Heuristic;
pub use renderer::{EvalMode, RenderBackend, Renderer};
