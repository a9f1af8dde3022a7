//! HTTP surface and startup wiring for the almanac engine.

pub mod api;
pub mod reload;
pub mod router;
pub mod settings;
pub mod startup;
pub mod state;

pub use reload::{ReloadError, SettingsReloader, SettingsWatch};
pub use router::build_router;
pub use settings::{Settings, SettingsError};
pub use state::AppState;
