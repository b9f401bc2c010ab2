pub mod client;
pub mod lookup;
pub mod types;

pub use client::{ShotgridClient, TrackingConfig, rest_collection};
pub use lookup::{EntityChoice, LookupError, LookupResult};
pub use types::{
    Entity, EntityRef, Fields, Filter, NOTE, PROJECT, SEQUENCE, SHOT, TrackingError,
    TrackingResult, TrackingService, VERSION,
};
