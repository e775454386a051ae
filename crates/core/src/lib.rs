pub mod guards;
pub mod lifecycle;
pub mod models;
pub mod validation;

pub use guards::{allowed_actions, MissionAction, Role, Viewer};
pub use lifecycle::{LifecycleError, MissionStatus};
