mod batch;
mod cache;
mod error;
mod loader;
mod op;
pub mod relation;
#[cfg(feature = "stats")]
mod stats;
mod worker;

pub use batch::BatchFunction;
pub use error::LoadError;
pub use loader::Loader;
