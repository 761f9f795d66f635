//! Chat-driven control of Hue lights.
//!
//! A [`session::Session`] ties a [`chat::ConversationManager`] (dialogue
//! state and token accounting) to a [`lights::DeviceController`] (name
//! resolution and bridge calls). Each prompt goes to the completion service;
//! a tool call comes back as an [`tools::Operation`] and
//! [`dispatch::dispatch`] applies it.

pub mod bridge;
pub mod chat;
pub mod dispatch;
pub mod error;
pub mod lights;
pub mod llm;
pub mod mission;
pub mod model;
pub mod paths;
pub mod persist;
pub mod session;
pub mod settings;
pub mod tools;
