pub mod engine;
pub mod oracle;
pub mod policies;
pub mod policy;
pub mod registry;

pub use engine::{AuthConf, AuthzEngine};
pub use oracle::{OwnershipOracle, PgOwnershipOracle};
pub use registry::{PolicyRegistry, PolicyRegistryBuilder};
