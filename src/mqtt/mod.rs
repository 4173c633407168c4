pub mod client;

pub use client::{connect, drive_event_loop};
