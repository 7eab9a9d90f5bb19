// FieldLens - field photo collection API core
//
// Workers are assigned jobs made of sectors; each sector requires an ordered
// checklist of photo types. Photos arrive over WhatsApp (or direct upload),
// are validated in the background and advance the sector checklist.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
