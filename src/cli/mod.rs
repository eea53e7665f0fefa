//! Command-line entrypoint: argument tree, dispatch, and server action.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod globals;

mod start;

pub use start::start;
