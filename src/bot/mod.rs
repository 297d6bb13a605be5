//! Bot module - Core bot functionality.

pub mod dispatcher;
pub mod messenger;
mod runtime;
pub mod update;
pub mod webhook;

pub use messenger::ThrottledBot;
pub use runtime::run;
