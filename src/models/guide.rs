// TV guide entries

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Allow-listed channel: guide id (display name) and its number on the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideChannel {
    pub name: String,
    pub number: u32,
}

/// One programme within an hour slot, joined with its channel icon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideEntry {
    pub channel: String,
    pub start: DateTime<Local>,
    pub stop: DateTime<Local>,
    pub title: String,
    pub categories: Vec<String>,
    pub description: String,
    pub image: String,
    pub channel_image: String,
    pub channel_number: u32,
    pub start_display: String,
    pub stop_display: String,
}
