//! Client-side form validation.
//!
//! Validation runs before any network call; a form that fails here never
//! reaches the backend and never touches the session.

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{LoginForm, SignupForm};

const MIN_PASSWORD_CHARS: usize = 6;

/// Per-field validation messages, keyed by form field name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    fn insert(&mut self, field: &'static str, message: &str) {
        self.0.entry(field).or_insert_with(|| message.to_owned());
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Validate a login form.
///
/// # Errors
///
/// Returns the failing fields.
pub fn validate_login(form: &LoginForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    let identifier = form.identifier.trim();
    if identifier.is_empty() {
        errors.insert("identifier", "Login ID / Email is required");
    } else if !looks_like_email(identifier) && !looks_like_employee_id(identifier) {
        errors.insert("identifier", "Enter a valid email or employee ID");
    }
    check_password(&mut errors, &form.password);
    errors.into_result()
}

/// Validate a company signup form.
///
/// # Errors
///
/// Returns the failing fields.
pub fn validate_signup(form: &SignupForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    require(&mut errors, "companyName", &form.company_name, "Company name is required");
    require(&mut errors, "name", &form.name, "Name is required");
    require(&mut errors, "email", &form.email, "Email is required");
    require(&mut errors, "phone", &form.phone, "Phone is required");
    if !form.email.trim().is_empty() && !looks_like_email(form.email.trim()) {
        errors.insert("email", "Email is invalid");
    }
    check_password(&mut errors, &form.password);
    if form.password != form.confirm_password {
        errors.insert("confirmPassword", "Passwords do not match");
    }
    errors.into_result()
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field, message);
    }
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errors.insert("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.insert("password", "Password must be at least 6 characters");
    }
}

/// `local@domain.tld` with no whitespace.
#[must_use]
pub fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty() && !host.is_empty() && !tld.is_empty()
}

/// Employee codes are four uppercase letters followed by five digits (`COJO23001`).
#[must_use]
pub fn looks_like_employee_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 9 && bytes[..4].iter().all(u8::is_ascii_uppercase) && bytes[4..].iter().all(u8::is_ascii_digit)
}
