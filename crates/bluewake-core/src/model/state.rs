use serde::Serialize;
use strum::{Display, EnumString};

/// Power state of the radio as last observed or driven by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdapterState {
    #[default]
    Off,
    Enabling,
    On,
    Disabling,
}

impl AdapterState {
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::Enabling | Self::Disabling)
    }
}
