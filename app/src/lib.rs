pub mod commands;
pub mod poll;
