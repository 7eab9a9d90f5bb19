// HTTP routes
pub mod health;
pub mod jobs;
pub mod upload;
pub mod uploads;
pub mod whatsapp;

pub use health::*;
pub use jobs::*;
pub use upload::*;
pub use uploads::*;
pub use whatsapp::*;
