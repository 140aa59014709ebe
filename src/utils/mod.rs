pub mod mock;
pub mod path;
