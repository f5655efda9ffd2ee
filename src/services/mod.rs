//! Cross-cutting services shared by the config layer and the Host
//! Bridge commands.

pub mod platform;
