pub mod cancel;
pub mod chunker;
pub mod collection;
pub mod config;
pub mod diff;
pub mod error;
pub mod ledger;
pub mod path_safety;
pub mod progress;
pub mod remote;
pub mod restore;
pub mod snapshot;
pub mod sync;
pub mod version;
pub mod walk;

pub use cancel::CancelToken;
pub use collection::{Collection, CommitReport};
pub use config::CollectionConfig;
pub use error::{Error, Result};
