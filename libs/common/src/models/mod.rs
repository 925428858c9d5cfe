//! Domain records persisted in the metadata store

pub mod asset;
pub mod card_set;
pub mod project;
pub mod user;

// Re-export for convenience
pub use asset::{
    Asset, AssetFilter, AssetType, DEFAULT_PAGE_SIZE, ImageAsset, MAX_PAGE_SIZE, MirroredAsset,
    NewAsset, SortOrder, VideoAsset,
};
pub use card_set::{CardSet, CardSetView, CardSlot, SlotAsset, card_set_code};
pub use project::{NewProject, Project, ProjectUpdate};
pub use user::{NewUser, User, UserRole, UserUpdate};
