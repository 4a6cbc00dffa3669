//! TargetingGates header-bidding adapters.
//!
//! This crate translates the host auction's bid requests into the wire
//! requests of the TargetingGates exchanges and turns their replies back into
//! normalized bids. The host performs all network I/O.
//!
//! # Modules
//!
//! - [`auction`]: Adapter trait, registry, auction session and shared types
//! - [`beacon`]: Outcome beacon pixels for the legacy exchange
//! - [`constants`]: Bidder codes and wire paths
//! - [`error`]: Error types and error handling utilities
//! - [`http_util`]: Lenient URL parsing and query helpers
//! - [`integrations`]: The `targetinggates` and `tg` adapters
//! - [`logging`]: Logger installation
//! - [`native`]: Native asset request and response handling
//! - [`openrtb`]: `OpenRTB` wire types used by the `tg` adapter
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing fixtures

pub mod auction;
pub mod beacon;
pub mod constants;
pub mod error;
pub mod http_util;
pub mod integrations;
pub mod logging;
pub mod native;
pub mod openrtb;
pub mod settings;
