use serde::Serialize;
use utoipa::ToSchema;

use super::attendance::round2;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub total_days: usize,
    pub present_days: usize,
    pub late_days: usize,
    pub absent_days: usize,
    pub leave_days: usize,
    /// (present + late) / total * 100, two decimals.
    #[schema(example = 92.31)]
    pub attendance_percentage: f64,
    #[schema(example = 104.5)]
    pub total_hours: f64,
}

pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    let mut summary = AttendanceSummary {
        total_days: records.len(),
        ..AttendanceSummary::default()
    };

    for record in records {
        match record.status {
            AttendanceStatus::Present => summary.present_days += 1,
            AttendanceStatus::Late => summary.late_days += 1,
            AttendanceStatus::Absent => summary.absent_days += 1,
            AttendanceStatus::OnLeave => summary.leave_days += 1,
        }
        summary.total_hours += record.total_hours.unwrap_or(0.0);
    }

    summary.total_hours = round2(summary.total_hours);
    if summary.total_days > 0 {
        let attended = (summary.present_days + summary.late_days) as f64;
        summary.attendance_percentage = round2(attended / summary.total_days as f64 * 100.0);
    }
    summary
}
