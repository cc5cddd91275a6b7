//! Skillpack Loader
//!
//! Turns a request into a ranked, budget-bounded sequence of skill content
//! for one session.
//!
//! ## Pipeline
//!
//! 1. [`Matcher`] ranks index entries against the query and tags
//! 2. Each candidate is checked against the [`SessionCache`]; delivered
//!    documents are skipped
//! 3. [`BudgetTracker`] admits or denies its cost; the first denial ends
//!    the pass with a partial status
//! 4. Content is resolved through a [`ContentResolver`] and recorded
//!
//! Cross-references are surfaced as `see_also` hints and never loaded
//! automatically. Sub-documents are delivered only through
//! [`Loader::expand`] or an explicit target.
//!
//! ## Example
//!
//! ```rust,ignore
//! let loader = Loader::new(Arc::new(index));
//! let session = Session::new(32_000);
//! let outcome = loader.load(&session, &LoadRequest::query("react hooks")).await;
//! ```

pub mod budget;
pub mod loader;
pub mod matcher;
pub mod resolver;
pub mod session;

pub use budget::{BudgetError, BudgetTracker, Reservation};
pub use loader::{Loader, DEFAULT_MAX_CANDIDATES};
pub use matcher::{Matcher, MatcherWeights, ScoredUnit};
pub use resolver::{ContentResolver, FsResolver};
pub use session::{Session, SessionCache, SessionCacheEntry, SessionError, SessionStats};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Loader, MatcherWeights, Session, SessionStats};
    pub use skillpack_types::{LoadOutcome, LoadRequest, LoadStatus};
}
