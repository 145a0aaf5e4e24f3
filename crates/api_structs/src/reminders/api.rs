use crate::dtos::{CycleReportDTO, HaltReasonDTO};
use serde::{Deserialize, Serialize};

pub mod get_reminders_status {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct APIResponse {
        pub halted: Option<HaltReasonDTO>,
        /// Sent reminders whose ledger records are not durable yet
        pub pending_ledger_writes: usize,
        pub last_cycle: Option<CycleReportDTO>,
    }
}
