pub mod catalog;
pub mod events;
pub mod prompt;
pub mod screens;
pub mod selection;
pub mod share;
