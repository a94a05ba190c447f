pub mod appointment;
pub mod business_hours;
pub mod chat_session;
pub mod provider;
pub mod reminder;
pub mod service;

pub use appointment::*;
pub use chat_session::*;
pub use provider::*;
pub use reminder::*;
pub use service::*;
