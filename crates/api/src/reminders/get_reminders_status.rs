use super::dispatcher::{CycleOutcome, CycleReport, HaltReason, ReminderDispatcher};
use actix_web::{web, HttpResponse};
use nudgeme_api_structs::dtos::{CycleReportDTO, HaltReasonDTO};
use nudgeme_api_structs::get_reminders_status::APIResponse;
use std::sync::Arc;

pub async fn get_reminders_status_controller(
    dispatcher: web::Data<Arc<ReminderDispatcher>>,
) -> HttpResponse {
    let status = dispatcher.status();

    HttpResponse::Ok().json(APIResponse {
        halted: status.halted.map(halt_reason_dto),
        pending_ledger_writes: dispatcher.pending_ledger_writes(),
        last_cycle: status.last_cycle.map(cycle_report_dto),
    })
}

fn halt_reason_dto(reason: HaltReason) -> HaltReasonDTO {
    match reason {
        HaltReason::CalendarUnauthorized => HaltReasonDTO::CalendarUnauthorized,
        HaltReason::MessagingUnauthorized => HaltReasonDTO::MessagingUnauthorized,
    }
}

fn cycle_report_dto(report: CycleReport) -> CycleReportDTO {
    let (outcome, error) = match report.outcome {
        CycleOutcome::Completed => ("completed", None),
        CycleOutcome::Skipped(e) => ("skipped", Some(e)),
        CycleOutcome::Failed(e) => ("failed", Some(e)),
    };
    CycleReportDTO {
        started_at: report.started_at,
        events_scanned: report.events_scanned,
        reminders_due: report.reminders_due,
        sent: report.sent,
        deferred: report.deferred,
        rejected: report.rejected,
        pruned: report.pruned,
        outcome: outcome.into(),
        error,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn it_maps_cycle_reports() {
        let report = CycleReport {
            started_at: Utc.with_ymd_and_hms(2021, 2, 21, 10, 0, 0).unwrap(),
            events_scanned: 3,
            reminders_due: 2,
            sent: 1,
            deferred: 1,
            rejected: 0,
            pruned: 0,
            outcome: CycleOutcome::Failed("Unable to persist the reminder ledger".into()),
        };
        let dto = cycle_report_dto(report);
        assert_eq!(dto.outcome, "failed");
        assert_eq!(
            dto.error.as_deref(),
            Some("Unable to persist the reminder ledger")
        );
        assert_eq!(dto.sent, 1);

        assert_eq!(
            halt_reason_dto(HaltReason::CalendarUnauthorized),
            HaltReasonDTO::CalendarUnauthorized
        );
    }
}
