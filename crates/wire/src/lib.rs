//! Shared wire protocol for the chat fabric: directory control-plane
//! requests/replies, group daemon messages, size limits, token generation,
//! and the KEY=VALUE config grammar common to the directory and client.

pub mod directory;
pub mod group;
pub mod kv_config;
pub mod limits;
pub mod token;
