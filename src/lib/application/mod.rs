pub mod client;
pub mod clock;
pub mod query;

pub use client::LunaTaskClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use query::{AliasListing, ListParams, Scope};
