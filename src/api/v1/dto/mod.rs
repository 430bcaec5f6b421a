pub mod resources;
pub mod token;
