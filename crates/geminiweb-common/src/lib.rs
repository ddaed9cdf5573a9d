pub mod errors;
pub mod events;
pub mod paths;

pub use errors::{ConfigError, PlatformError};
pub use events::{EventBus, SessionEvent};
