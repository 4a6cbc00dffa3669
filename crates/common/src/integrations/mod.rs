//! Exchange integrations.
//!
//! Each integration exposes a `register_adapter` builder that the auction
//! registry calls with the loaded settings.

pub mod targetinggates;
pub mod tg;

pub use targetinggates::TargetingGatesAdapter;
pub use tg::TgAdapter;
