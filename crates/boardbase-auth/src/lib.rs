pub mod errors;
pub mod resolver;
pub mod prelude;

pub use resolver::{CredentialResolver, RequestSnapshot};
