pub mod meta;
pub mod parameters;
pub mod vertex;
