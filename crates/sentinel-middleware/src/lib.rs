//! `sentinel-middleware` – The Nervous System
//!
//! Moves events between the watchdog tasks without caring about their
//! meaning.
//!
//! # Modules
//!
//! - [`fault_channel`] – the bounded, drop-newest, single-consumer channel
//!   carrying [`FaultReport`][sentinel_types::FaultReport]s from the monitors
//!   to the fault dispatcher.
//! - [`bus`] – broadcast bus carrying operating-mode changes to the
//!   indicator subsystem.

pub mod bus;
pub mod fault_channel;

pub use bus::{ModeBus, ModeChange, ModeSubscriber};
pub use fault_channel::{
    FAULT_CHANNEL_CAPACITY, FaultReceiver, FaultSender, PushOutcome, fault_channel,
    fault_channel_with_capacity,
};
