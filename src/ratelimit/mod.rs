//! Hit counting, window expiry and store management.

mod backend;
mod clock;
mod record;
mod store;
mod sweeper;

pub use backend::HitStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{CountingMode, HitRecord, IncrementResult};
pub use store::{WindowStore, DEFAULT_MAX_CONNECTIONS, DEFAULT_WINDOW_SECONDS};
pub use sweeper::Sweeper;
