//! Observer trait for session state changes.
//!
//! Register an [`Arc<dyn SessionObserver>`] with
//! [`crate::session::AnalysisSession::subscribe`] to hear about every state
//! change. The terminal front-end uses it to print the report once the
//! result arrives; a GUI would scroll the results panel into view from
//! [`SessionObserver::on_results_ready`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_labreport::{AnalysisSession, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
//!
//! struct LastVersion(AtomicU64);
//!
//! impl SessionObserver for LastVersion {
//!     fn on_state_changed(&self, version: u64) {
//!         self.0.store(version, Ordering::SeqCst);
//!     }
//! }
//!
//! let seen = Arc::new(LastVersion(AtomicU64::new(0)));
//! let mut session = AnalysisSession::new();
//! session.subscribe(seen.clone() as Arc<dyn SessionObserver>);
//! session.toggle_only_abnormal();
//! assert_eq!(seen.0.load(Ordering::SeqCst), session.version());
//! ```

use crate::model::AnalysisResult;
use std::sync::Arc;

/// Called by [`crate::session::AnalysisSession`] as its state changes.
///
/// All methods have default no-op implementations so observers only
/// override what they care about. Observers run synchronously, inside the
/// session call that caused the change.
pub trait SessionObserver: Send + Sync {
    /// Any state change; `version` is the session's new version counter.
    fn on_state_changed(&self, version: u64) {
        let _ = version;
    }

    /// The result slot was replaced (set, or cleared to `None`).
    fn on_result_changed(&self, version: u64, result: Option<&AnalysisResult>) {
        let _ = (version, result);
    }

    /// A new result arrived. Fired once per completed analysis.
    fn on_results_ready(&self, result: &AnalysisResult) {
        let _ = result;
    }

    /// The error slot was set.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for a shared observer.
pub type SharedObserver = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_state_changed(1);
        o.on_result_changed(2, None);
        o.on_error("algo falló");
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: SharedObserver = Arc::new(NoopObserver);
        o.on_state_changed(3);
        o.on_result_changed(3, None);
    }
}
