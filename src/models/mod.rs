//! Domain model module declarations.

pub mod directory;
pub mod report;
pub mod ticket;
