pub mod company;
pub mod dealer;
pub mod user;
pub mod lot;

pub use company::*;
pub use dealer::*;
pub use user::*;
pub use lot::*;
