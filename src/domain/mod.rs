pub mod intent;
pub mod order;

pub use intent::*;
pub use order::*;
