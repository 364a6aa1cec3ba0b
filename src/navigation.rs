//! Navigation sink shared by views, the route guard, and the 401 interceptor.

#[cfg(test)]
#[path = "navigation_test.rs"]
mod tests;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::routes::{self, GuardDecision, Route};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Push,
    Replace,
    /// Full reload: all in-memory view state is discarded.
    HardReload,
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &Route, mode: NavigationMode);
}

/// Guard `route` against `session` and navigate to whatever the guard allows.
///
/// Redirects replace the current entry so "back" does not return to a view
/// the user could not see.
pub fn visit(navigator: &dyn Navigator, session: &Session, route: &Route) -> GuardDecision {
    let decision = routes::guard(session, route);
    match &decision {
        GuardDecision::Render(target) => navigator.navigate(target, NavigationMode::Push),
        GuardDecision::Redirect(target) => {
            tracing::debug!(from = %route, to = %target, "route guard redirect");
            navigator.navigate(target, NavigationMode::Replace);
        }
    }
    decision
}

/// In-process navigation history.
#[derive(Debug, Default)]
pub struct History {
    entries: Mutex<Vec<(Route, NavigationMode)>>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<Route> {
        self.lock().last().map(|(route, _)| route.clone())
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(Route, NavigationMode)> {
        self.lock().clone()
    }

    #[must_use]
    pub fn hard_reloads(&self) -> usize {
        self.lock()
            .iter()
            .filter(|(_, mode)| *mode == NavigationMode::HardReload)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Route, NavigationMode)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for History {
    fn navigate(&self, route: &Route, mode: NavigationMode) {
        let mut entries = self.lock();
        if mode == NavigationMode::Replace {
            entries.pop();
        }
        entries.push((route.clone(), mode));
    }
}
