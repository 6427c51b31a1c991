pub mod data;
pub mod grid;

pub use data::WidgetDataService;
pub use grid::{GridState, WidgetGridStore};
