pub mod actions;
mod generation;
mod sessions;
mod titles;

pub use generation::*;
pub use sessions::*;
pub use titles::*;
