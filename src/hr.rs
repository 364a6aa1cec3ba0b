//! Typed wrappers over the HR REST endpoints.
//!
//! Every call goes through `ApiClient`, so each one is authorized by the
//! configured transport and a 401 expires the session like any other call.

#[cfg(test)]
#[path = "hr_test.rs"]
mod tests;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ApiClient, ApiError};
use crate::types::{self, UserProfile};

pub const PROFILE_PATH: &str = "/api/user/profile";
pub const EMPLOYEES_PATH: &str = "/employees";
pub const CREATE_EMPLOYEE_PATH: &str = "/employees/create";
pub const CHECK_IN_PATH: &str = "/attendance/check-in";
pub const CHECK_OUT_PATH: &str = "/attendance/check-out";
pub const MY_ATTENDANCE_PATH: &str = "/attendance/my";
pub const ADMIN_ATTENDANCE_PATH: &str = "/attendance/admin";
pub const LEAVE_REQUESTS_PATH: &str = "/api/leave-requests";
pub const MY_LEAVES_PATH: &str = "/api/leave-requests/my-leaves";
pub const COMPANY_PATH: &str = "/api/company";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub job_position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub year_of_joining: Option<i32>,
}

impl Employee {
    /// `fullName` when the backend computed one, else first + last.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.full_name.as_deref().map(str::trim) {
            Some(full) if !full.is_empty() => full.to_owned(),
            _ => format!("{} {}", self.first_name, self.last_name).trim().to_owned(),
        }
    }
}

/// Body of `POST /employees/create`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub year_of_joining: i32,
    pub mobile: String,
    pub department: String,
    pub manager: String,
    pub location: String,
    pub job_position: String,
}

/// One row of an attendance listing. Times are `HH:mm:ss`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub work_hours: Option<f64>,
    #[serde(default)]
    pub extra_hours: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    PaidTimeOff,
    SickLeave,
    UnpaidLeave,
}

impl LeaveType {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::PaidTimeOff => "Paid Time Off",
            Self::SickLeave => "Sick Leave",
            Self::UnpaidLeave => "Unpaid Leave",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub start_date: String,
    pub end_date: String,
    pub leave_type: LeaveType,
    #[serde(default)]
    pub status: Option<LeaveStatus>,
    #[serde(default)]
    pub number_of_days: Option<f64>,
    #[serde(default)]
    pub attendance_note: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub admin_comment: Option<String>,
}

/// Body of `POST /api/leave-requests`. Dates are `YYYY-MM-DD`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveDraft {
    pub start_date: String,
    pub end_date: String,
    pub leave_type: LeaveType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_note: Option<String>,
}

/// Paged listing as returned by the leave endpoints.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(default, alias = "name")]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// CALLS
// =============================================================================

#[derive(Clone)]
pub struct HrApi {
    api: ApiClient,
}

impl HrApi {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let body: Value = self.api.get(PROFILE_PATH).await?;
        Ok(types::parse_user(body)?)
    }

    /// Send a partial profile update and return the stored profile.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn update_profile(&self, changes: &Map<String, Value>) -> Result<UserProfile, ApiError> {
        let body: Value = self.api.put(PROFILE_PATH, changes).await?;
        Ok(types::parse_user(body)?)
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn employees(&self) -> Result<Vec<Employee>, ApiError> {
        self.api.get(EMPLOYEES_PATH).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn employee(&self, id: &str) -> Result<Employee, ApiError> {
        self.api.get(&format!("{EMPLOYEES_PATH}/{id}")).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn create_employee(&self, employee: &NewEmployee) -> Result<Employee, ApiError> {
        self.api.post(CREATE_EMPLOYEE_PATH, employee).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn check_in(&self) -> Result<(), ApiError> {
        let _: IgnoredAny = self.api.post_empty(CHECK_IN_PATH).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn check_out(&self) -> Result<(), ApiError> {
        let _: IgnoredAny = self.api.post_empty(CHECK_OUT_PATH).await?;
        Ok(())
    }

    /// The caller's own attendance, optionally for one `YYYY-MM-DD` day.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn my_attendance(&self, date: Option<&str>) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.api.get(&with_date(MY_ATTENDANCE_PATH, date)).await
    }

    /// Company-wide attendance for HR.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn attendance_report(&self, date: Option<&str>) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.api.get(&with_date(ADMIN_ATTENDANCE_PATH, date)).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn my_leaves(&self) -> Result<Vec<LeaveRequest>, ApiError> {
        let page: Page<LeaveRequest> = self.api.get(MY_LEAVES_PATH).await?;
        Ok(page.content)
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn request_leave(&self, draft: &LeaveDraft) -> Result<LeaveRequest, ApiError> {
        self.api.post(LEAVE_REQUESTS_PATH, draft).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn company(&self) -> Result<Company, ApiError> {
        self.api.get(COMPANY_PATH).await
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn update_company(&self, company: &Company) -> Result<Company, ApiError> {
        self.api.put(COMPANY_PATH, company).await
    }
}

fn with_date(path: &str, date: Option<&str>) -> String {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => format!("{path}?date={date}"),
        None => path.to_owned(),
    }
}
