//! Database models split into domain-specific modules.

pub mod appointment;
pub mod audit;
pub mod doctor;
pub mod patient;
pub mod transaction;
pub mod user;

pub use appointment::*;
pub use audit::*;
pub use doctor::*;
pub use patient::*;
pub use transaction::*;
pub use user::*;
