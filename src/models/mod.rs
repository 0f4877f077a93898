// Core data models for the lot ledger
// These structs represent the domain entities

pub mod stage;
pub mod lot;
pub mod company;
pub mod dealer;
pub mod user;

pub use stage::*;
pub use lot::*;
pub use company::*;
pub use dealer::*;
pub use user::*;
