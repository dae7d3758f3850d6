pub mod common;
pub mod dirty;
pub mod status;
pub mod wipe;
