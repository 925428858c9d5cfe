//! Per-(user, project) slot mapping consumed by the XR lookups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The three asset slots a card set can fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardSlot {
    Logo,
    CardImage,
    Video,
}

impl CardSlot {
    /// Column holding the slot pointer
    pub fn column(&self) -> &'static str {
        match self {
            CardSlot::Logo => "logo_asset_id",
            CardSlot::CardImage => "card_image_asset_id",
            CardSlot::Video => "video_asset_id",
        }
    }
}

/// Parses the public slot names used in `/xr/{code}/{slot}`
impl FromStr for CardSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logo" => Ok(CardSlot::Logo),
            "card" => Ok(CardSlot::CardImage),
            "video" => Ok(CardSlot::Video),
            other => Err(format!(
                "Unknown slot '{}', expected one of: logo, card, video",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardSet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    /// Assigned once at creation, never changes
    pub code: String,
    pub logo_asset_id: Option<Uuid>,
    pub card_image_asset_id: Option<Uuid>,
    pub video_asset_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardSet {
    pub fn slot(&self, slot: CardSlot) -> Option<Uuid> {
        match slot {
            CardSlot::Logo => self.logo_asset_id,
            CardSlot::CardImage => self.card_image_asset_id,
            CardSlot::Video => self.video_asset_id,
        }
    }

    pub fn set_slot(&mut self, slot: CardSlot, asset_id: Option<Uuid>) {
        match slot {
            CardSlot::Logo => self.logo_asset_id = asset_id,
            CardSlot::CardImage => self.card_image_asset_id = asset_id,
            CardSlot::Video => self.video_asset_id = asset_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAsset {
    pub asset_id: Uuid,
    pub url: String,
}

/// A card set with its slot pointers resolved to asset URLs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardSetView {
    pub code: String,
    pub project_id: Uuid,
    pub logo: Option<SlotAsset>,
    pub card: Option<SlotAsset>,
    pub video: Option<SlotAsset>,
}

impl CardSetView {
    pub fn slot(&self, slot: CardSlot) -> Option<&SlotAsset> {
        match slot {
            CardSlot::Logo => self.logo.as_ref(),
            CardSlot::CardImage => self.card.as_ref(),
            CardSlot::Video => self.video.as_ref(),
        }
    }
}

/// Human-readable code for a user's n-th card set: `User001`, `User002`, ...
pub fn card_set_code(sequence: i64) -> String {
    format!("User{:03}", sequence)
}
