mod action;
mod backend;
mod composer;
mod error;
mod event;
mod generation;
mod message;
mod persisted;
mod session;
mod slash_commands;
mod storage;
mod theme;

pub use action::*;
pub use backend::*;
pub use composer::*;
pub use error::*;
pub use event::*;
pub use generation::*;
pub use message::*;
pub use persisted::*;
pub use session::*;
pub use slash_commands::*;
pub use storage::*;
pub use theme::*;
