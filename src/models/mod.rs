pub mod tracking;

pub use tracking::{
    LoginChange, ObservedLogin, PlayerRecord, StoreDocument, TrackedPlayer, Watcher,
};
