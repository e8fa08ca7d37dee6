//! Asset domain module: fixed assets, their states and the movement ledger
//! that tracks where each asset is and who is responsible for it.

pub mod asset;
pub mod catalog;
pub mod movement;

pub use asset::{
    Asset, AssetCommand, AssetEvent, AssetId, AssetMoved, AssetRegistered, AssetStateChanged,
    ChangeAssetState, RegisterAsset,
};
pub use catalog::{AssetMovementType, AssetState, Location, LocationId};
pub use movement::{AssetMovement, AssetMovementId, CurrentLocation, RecordMovement};
