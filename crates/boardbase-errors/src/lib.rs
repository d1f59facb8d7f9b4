pub mod codes;
pub mod model;
pub mod retry;
pub mod prelude;

pub use model::{ErrorBuilder, ErrorObj};
