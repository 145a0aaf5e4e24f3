use serde::{Deserialize, Serialize};

pub mod twilio_webhook {
    use super::*;

    /// The subset of the Twilio webhook form fields that is used
    #[derive(Debug, Deserialize, Serialize, Default)]
    pub struct RequestBody {
        #[serde(rename = "From", default)]
        pub from: String,
        #[serde(rename = "Body", default)]
        pub body: String,
    }
}
