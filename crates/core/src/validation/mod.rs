mod rules;

pub use rules::{validate_application_draft, validate_mission_draft, validate_withdrawal};
