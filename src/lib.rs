// tchaller - Conversational Place Search
//
// French plain-language questions in, ranked nearby places and a conversational reply out

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Configuration loading
pub mod config;

/// Query understanding, planning, ranking and replies
pub mod search;

/// SQLite datastore and search audit log
#[cfg(feature = "storage")]
pub mod storage;

/// HTTP API
#[cfg(feature = "server")]
pub mod server;

/// Command line interface
#[cfg(feature = "cli")]
pub mod cli;

pub use config::TchallerConfig;
pub use search::{
    Candidate, CandidateSource, Intent, RankedResult, ResponseBundle, SearchEngine, SearchLog,
    SearchLogSink, SearchRequest,
};

#[cfg(feature = "storage")]
pub use storage::PlaceStore;

#[cfg(feature = "server")]
pub use server::TchallerServer;
