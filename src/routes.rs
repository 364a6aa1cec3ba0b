//! Views and the route guard in front of them.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation re-runs `guard` against a fresh session snapshot. The
//! guard is a pure function: no caching, no network.

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;

use std::fmt;

use crate::session::Session;
use crate::types::Role;

/// A view of the HR client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
    Employees,
    Employee(String),
    Attendance,
    MyAttendance,
    TimeOff,
    Profile,
    Company,
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_owned(),
            Self::Signup => "/signup".to_owned(),
            Self::Dashboard => "/dashboard".to_owned(),
            Self::Employees => "/employees".to_owned(),
            Self::Employee(id) => format!("/employees/{id}"),
            Self::Attendance => "/attendance".to_owned(),
            Self::MyAttendance => "/my-attendance".to_owned(),
            Self::TimeOff => "/time-off".to_owned(),
            Self::Profile => "/profile".to_owned(),
            Self::Company => "/company".to_owned(),
        }
    }

    /// Parse an app path. Query strings and trailing slashes are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        let route = match path {
            "/login" => Self::Login,
            "/signup" => Self::Signup,
            "" | "/dashboard" => Self::Dashboard,
            "/employees" => Self::Employees,
            "/attendance" => Self::Attendance,
            "/my-attendance" => Self::MyAttendance,
            "/time-off" => Self::TimeOff,
            "/profile" => Self::Profile,
            "/company" => Self::Company,
            other => {
                let id = other.strip_prefix("/employees/")?;
                if id.is_empty() || id.contains('/') {
                    return None;
                }
                Self::Employee(id.to_owned())
            }
        };
        Some(route)
    }

    /// Requires a logged-in session.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login | Self::Signup)
    }

    /// Reachable only by HR users.
    #[must_use]
    pub fn is_hr_only(&self) -> bool {
        matches!(self, Self::Employees | Self::Employee(_) | Self::Attendance)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Landing view after login.
#[must_use]
pub fn home_for(role: &Role) -> Route {
    if role.is_hr() { Route::Dashboard } else { Route::MyAttendance }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Route),
    Redirect(Route),
}

impl GuardDecision {
    /// The route that ends up on screen.
    #[must_use]
    pub fn target(&self) -> &Route {
        match self {
            Self::Render(route) | Self::Redirect(route) => route,
        }
    }
}

/// Decide whether `route` may render for `session`.
///
/// Anonymous users are sent to `/login` from any protected view. Logged-in
/// users skip the auth forms and are kept out of HR-only views unless HR.
#[must_use]
pub fn guard(session: &Session, route: &Route) -> GuardDecision {
    let Some(role) = session.role() else {
        return if route.is_protected() {
            GuardDecision::Redirect(Route::Login)
        } else {
            GuardDecision::Render(route.clone())
        };
    };

    if !route.is_protected() || (route.is_hr_only() && !role.is_hr()) {
        return GuardDecision::Redirect(home_for(role));
    }
    GuardDecision::Render(route.clone())
}
