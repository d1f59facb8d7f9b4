pub mod errors;
pub mod model;
pub mod prelude;

pub mod spi {
    pub mod repo;

    pub use repo::*;
}

pub mod memory;

pub use errors::StorageError;
pub use model::*;
pub use spi::*;
