//! Controllers served by the demo binary.

pub mod hello;
pub mod users;
