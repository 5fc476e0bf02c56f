//! Data models for Marquee

mod listing;
mod movie;
mod pricing;
mod reservation;
mod show;
mod showroom;

pub use listing::*;
pub use movie::*;
pub use pricing::*;
pub use reservation::*;
pub use show::*;
pub use showroom::*;
