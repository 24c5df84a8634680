//! Shopbot is a terminal chat client for a streaming shopping-assistant
//! relay.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns runtime state: the session controller, the incremental
//!   stream decoder, stream dispatch, configuration, and notices.
//! - [`storage`] defines the conversation/message store contracts and the
//!   in-memory store the binary runs on.
//! - [`ui`] renders the terminal interface and runs the interactive event
//!   loop that drives user input and display updates.
//! - [`api`] defines the wire payloads exchanged with the relay.
//!
//! The binary entrypoint (`src/main.rs`) loads configuration, wires the
//! stores and channels together, and hands control to
//! [`ui::chat_loop::run`].

pub mod api;
pub mod core;
pub mod storage;
pub mod ui;
pub mod utils;
