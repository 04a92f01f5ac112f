pub mod compositor;
pub mod config;
pub mod grid_planner;
pub mod inference;
pub mod mask;
pub mod model_runner;
pub mod model_value_range;
pub mod pixelator;
pub mod source;

mod extent;
pub use extent::Extent;
