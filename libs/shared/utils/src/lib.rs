pub mod clock;
pub mod extractor;
pub mod state;
pub mod test_utils;

pub use clock::{Clock, SystemClock};
pub use state::AppState;
