pub mod health;
pub mod resources;
pub mod session;
pub mod token;
