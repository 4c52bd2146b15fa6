//! DualShock-driven rover control
//!
//! A single reader thread decodes the controller's event device into an
//! [`controller::EventCache`]; independent control loops poll that cache and
//! drive motors, LEDs, sounds and an accessory through the sink traits in
//! [`output`].

pub mod config;
pub mod control;
pub mod controller;
pub mod orchestrator;
pub mod output;
