pub mod endpoint;
pub mod settings;
pub mod shutdown;
pub mod types;

pub use endpoint::{Endpoint, EndpointError, EndpointSet};
pub use settings::{NodeSettings, SettingsError, SettingsOverrides};
pub use shutdown::{Shutdown, wait_for_shutdown};
pub use types::*;
