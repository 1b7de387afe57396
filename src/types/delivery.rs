//! Transport delivery mode for the lighting network.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How the lighting client delivers requests to devices.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Every request is acknowledged and retransmitted until acknowledged
    #[default]
    Reliable,
    /// Fire and forget
    BestEffort,
}
