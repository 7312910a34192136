//! Terminal client for the FauceTea rock-paper-scissors faucet game.

pub mod address;
pub mod api_client;
pub mod client;
pub mod config;
pub mod copy_feedback;
pub mod feed;
pub mod game;
pub mod ui;
pub mod wallet;
