//! # General Messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::connection::Connection;

/// Free-form message between connected peers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicMessage {
    /// Stamped by the sending agent.
    #[serde(default)]
    pub id: String,
    pub connection: Connection,
    pub content: String,
    #[serde(default)]
    pub sent_time: Option<DateTime<Utc>>,
}

/// Read (and optionally consume) an owner's inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGeneralMessage {
    pub did: String,
    /// Only the most recent entry instead of the whole list.
    #[serde(default)]
    pub latest: bool,
    #[serde(default)]
    pub remove_after_read: bool,
}
