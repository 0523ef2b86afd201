mod core;
mod ops;

pub use self::core::Collection;
pub use self::ops::CollectionWriter;
