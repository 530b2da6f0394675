//! Concrete refresh sources over the generic HTTP device client.

mod device_hub;
mod feeder;

pub use device_hub::{DEVICE_ID_PLACEHOLDER, DeviceHubConfig, DeviceHubSource};
pub use feeder::{FeederConfig, FeederSource};
