mod component;
mod layout;
mod model;
mod render;
mod simulation;
mod state;
mod tree_layout;

pub use component::GraphDemo;
pub use layout::LayoutMode;
