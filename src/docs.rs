use crate::api::attendance::{MarkAttendanceReq, ReportResponse};
use crate::api::holiday::{
    CreateHoliday, DeleteHoliday, HolidayListResponse, SyncHolidaysReq, UpdateHoliday,
};
use crate::api::qr::ValidateQrReq;
use crate::model::attendance::AttendanceStatus;
use crate::model::holiday::{Holiday, HolidayStats, HolidayType};
use crate::model::qr_code::QrInfo;
use crate::model::user::UserSummary;
use crate::models::{
    AuthResponse, ForgotPasswordReqDto, LoginReqDto, RegisterReqDto, ResetPasswordReqDto,
    SetPasswordReqDto, UpdateProfileReqDto, VerifyOtpReqDto,
};
use crate::service::holiday::SyncReport;
use crate::service::qr::QrVerdict;
use crate::service::report::AttendanceSummary;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Smart Attendance API",
        version = "1.0.0",
        description = r#"
## Smart Attendance System

Backend for QR-based daily attendance.

### Features
- **Accounts**: registration, login, first-login password setup, OTP password reset
- **Attendance**: one check-in and one check-out per day, Present/Late derived from the clock
- **QR codes**: static allow-list or database-backed codes with date and time windows
- **Holidays**: local calendar, managed by hand or synced from Nager.Date
- **Reports**: per-user totals and attendance percentage

### Security
Everything outside `/auth` expects `Authorization: Bearer <token>`.

### Response Format
Every response carries `success`; failures add a `message`.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::register,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::verify_otp,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::set_password,

        crate::api::attendance::mark,
        crate::api::attendance::history,
        crate::api::attendance::report,
        crate::api::attendance::today,

        crate::api::qr::validate,

        crate::api::holiday::list_holidays,
        crate::api::holiday::check_holiday,
        crate::api::holiday::holiday_stats,
        crate::api::holiday::create_holiday,
        crate::api::holiday::update_holiday,
        crate::api::holiday::delete_holiday,
        crate::api::holiday::sync_holidays,

        crate::api::user::profile,
        crate::api::user::update,
        crate::api::user::count
    ),
    components(
        schemas(
            LoginReqDto,
            RegisterReqDto,
            ForgotPasswordReqDto,
            VerifyOtpReqDto,
            ResetPasswordReqDto,
            SetPasswordReqDto,
            UpdateProfileReqDto,
            AuthResponse,
            UserSummary,
            MarkAttendanceReq,
            AttendanceStatus,
            AttendanceSummary,
            ReportResponse,
            ValidateQrReq,
            QrVerdict,
            QrInfo,
            Holiday,
            HolidayType,
            HolidayStats,
            HolidayListResponse,
            CreateHoliday,
            UpdateHoliday,
            DeleteHoliday,
            SyncHolidaysReq,
            SyncReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, registration and password recovery"),
        (name = "Attendance", description = "Check-in, check-out and reports"),
        (name = "QR", description = "QR code validation"),
        (name = "Holiday", description = "Holiday calendar"),
        (name = "User", description = "User profiles"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
