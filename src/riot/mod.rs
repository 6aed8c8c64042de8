mod client;
mod endpoints;
mod region;
mod source;
pub mod types;

pub use client::RiotClient;
pub use region::{Platform, Region};
pub use types::{AccountDto, LeagueEntryDto, MatchDto, ParticipantDto};
