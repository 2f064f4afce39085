pub mod names;
pub mod paths;
