//! Boundary DTOs for the Dayflow REST contract.
//!
//! DESIGN
//! ======
//! Backend payloads are normalized exactly once, here. Login accepts both
//! contract shapes seen in the wild (`{accessToken, user}` and a bare user
//! object); anything without a usable user fails with `MalformedResponse`
//! so downstream code only ever sees a normalized `UserProfile`.

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A backend payload that could not be normalized into the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed response: {0}")]
pub struct MalformedResponse(pub String);

impl MalformedResponse {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

// =============================================================================
// USER
// =============================================================================

/// Role assigned to the logged-in user. Drives which views are reachable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Hr,
    Employee,
    Other(String),
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hr => "HR",
            Self::Employee => "EMPLOYEE",
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_hr(&self) -> bool {
        matches!(self, Self::Hr)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HR" => Self::Hr,
            "EMPLOYEE" => Self::Employee,
            _ => Self::Other(raw),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_owned()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logged-in user as returned by login and `/api/user/profile`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Backend row id, if sent.
    #[serde(default, deserialize_with = "deserialize_optional_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Email or employee id the user logs in with.
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_avatar: Option<String>,
    /// Employee code such as `COJO23001`. Employees only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_position: Option<String>,
    /// Any further backend fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Minimal profile; mostly useful for tests and fixtures.
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            identifier: identifier.into(),
            name: name.into(),
            role,
            company_name: None,
            company_avatar: None,
            employee_id: None,
            department: None,
            job_position: None,
            extra: Map::new(),
        }
    }
}

/// Normalize a backend user object.
///
/// Profile endpoints send `email` where login sends `identifier`; either is
/// accepted. `role` must be present.
///
/// # Errors
///
/// Returns `MalformedResponse` if the value is not an object, has no
/// non-empty identifier/email, has no role, or has mistyped fields.
pub fn parse_user(value: Value) -> Result<UserProfile, MalformedResponse> {
    let Value::Object(mut map) = value else {
        return Err(MalformedResponse::new("user payload is not an object"));
    };

    if !map.contains_key("identifier") {
        if let Some(email) = map.get("email").cloned() {
            map.insert("identifier".to_owned(), email);
        }
    }
    if !non_empty_str(map.get("identifier")) {
        return Err(MalformedResponse::new("user payload has no identifier"));
    }
    if !non_empty_str(map.get("role")) {
        return Err(MalformedResponse::new("user payload has no role"));
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| MalformedResponse::new(e.to_string()))
}

fn non_empty_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected integer id")),
        Value::String(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom("expected numeric id string")),
        _ => Err(D::Error::custom("expected id number or string")),
    }
}

// =============================================================================
// AUTH PAYLOADS
// =============================================================================

/// Normalized body of `POST /api/auth/login`.
#[derive(Clone, Debug, PartialEq)]
pub struct LoginResponse {
    pub message: Option<String>,
    /// Present when the backend issues bearer tokens.
    pub access_token: Option<String>,
    pub user: UserProfile,
}

impl LoginResponse {
    /// # Errors
    ///
    /// Returns `MalformedResponse` if no usable user can be found.
    pub fn parse(body: Value) -> Result<Self, MalformedResponse> {
        let Value::Object(mut map) = body else {
            return Err(MalformedResponse::new("login response is not an object"));
        };
        let message = take_string(&mut map, "message");
        let access_token = take_string(&mut map, "accessToken");
        let user = match map.remove("user") {
            Some(user) => parse_user(user)?,
            None => parse_user(Value::Object(map))?,
        };
        Ok(Self { message, access_token, user })
    }
}

/// Normalized body of `POST /api/auth/sign-up`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignupResponse {
    pub message: Option<String>,
    pub user: Option<UserProfile>,
}

impl SignupResponse {
    /// # Errors
    ///
    /// Returns `MalformedResponse` if a user is present but unusable.
    pub fn parse(body: Value) -> Result<Self, MalformedResponse> {
        let mut map = match body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            Value::String(message) => return Ok(Self { message: Some(message), user: None }),
            _ => return Err(MalformedResponse::new("signup response is not an object")),
        };
        let message = take_string(&mut map, "message");
        let user = match map.remove("user").or_else(|| map.remove("hr")) {
            Some(Value::Null) | None => None,
            Some(user) => Some(parse_user(user)?),
        };
        Ok(Self { message, user })
    }
}

/// Pull the `message` field out of an error body, if it has one.
#[must_use]
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

// =============================================================================
// FORMS
// =============================================================================

/// Login form as submitted by the user.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginForm {
    /// Email or employee id.
    pub identifier: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), password: password.into() }
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HR company signup form. `confirm_password` never leaves the client.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub company_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
}

impl fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupForm")
            .field("company_name", &self.company_name)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .finish_non_exhaustive()
    }
}
