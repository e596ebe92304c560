pub mod store;

pub use crate::store::{AppState, Gallery, Popups};
