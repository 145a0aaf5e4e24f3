mod event;
mod oauth;
mod reminders;
mod sms;
mod status;

pub mod dtos {
    pub use crate::event::dtos::*;
    pub use crate::reminders::dtos::*;
}

pub use crate::event::api::*;
pub use crate::oauth::api::*;
pub use crate::reminders::api::*;
pub use crate::sms::api::*;
pub use crate::status::api::*;
