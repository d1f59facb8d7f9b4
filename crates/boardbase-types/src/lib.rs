pub mod id;
pub mod owner;
pub mod time;
pub mod prelude;
