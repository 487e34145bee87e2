//! # Core Application Logic
//!
//! Business state and orchestration. This module knows nothing about any
//! particular presentation: a UI renders the controller's observable state
//! (`messages`, `pending_input`, `is_loading`, notifications) and calls
//! `submit`; rendering is a pure function of that state.
//!
//! ## Modules
//!
//! - [`controller`]: the `ConversationController` and its submit state machine
//! - [`config`]: settings file, env overrides, resolution

pub mod config;
pub mod controller;
