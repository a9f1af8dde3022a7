pub mod clock;
pub mod config;
pub mod error;
pub mod scope;
pub mod snapshot;

pub use clock::{BucketKey, Clock, Granularity, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::*;
pub use scope::*;
pub use snapshot::*;
