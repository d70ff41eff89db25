//! Request handlers for the marker endpoints.

mod fetch;
mod publish;

pub use fetch::*;
pub use publish::*;
