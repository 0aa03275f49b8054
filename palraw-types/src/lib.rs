pub mod compression;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod variant;

pub use compression::*;
pub use error::*;
pub use frame::*;
pub use metadata::*;
pub use variant::*;
