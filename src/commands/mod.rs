pub mod apply;
pub mod diff;
pub mod state;
pub mod validate;
