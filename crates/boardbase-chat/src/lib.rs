pub mod backend;
pub mod errors;
pub mod limit;
pub mod model;
pub mod proxy;
pub mod tool_usage;
pub mod prelude;

pub use proxy::ChatProxy;
