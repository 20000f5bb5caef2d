pub mod focus;
pub mod paste;
pub mod permission;
