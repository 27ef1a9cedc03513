//! The `stomp` module implements the text frame protocol spoken with the
//! broker over the web-socket link.
//!
//! One web-socket text message carries exactly one frame. A message made of
//! bare end-of-line characters is a heart-beat.

pub mod frame;

pub use frame::{Command, Frame, HeartBeat};
