//! InTune matching engine.
//!
//! Scores music-taste affinity between users and runs the connection state
//! machine (`Pending` to `Accepted`, `Rejected` or `Blocked`). Durable state
//! lives behind the collaborator traits in [`repo`]; this crate does no I/O.

pub mod connection;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod profile;
pub mod ranking;
pub mod repo;
pub mod similarity;
pub mod taste;
pub mod time;

pub use connection::{Connection, ConnectionState, ConnectionStats, FeedEntry, NewConnection, Role};
pub use error::{ConnectError, ErrorKind};
pub use lifecycle::ConnectionLifecycle;
pub use model::{ConnectionId, Counter, Song, SongId, TrackSummary, UserId, UserRecord};
pub use profile::{NewSong, NewUser, SongUpdate, UserUpdate, ValidationError};
pub use ranking::{Candidate, RankLimit, Recommendation, rank};
pub use repo::{ConnectionStore, SongRepository, StoreFault, UserLookup};
pub use similarity::{
    Overlap, SimilarityScore, SimilarityWeights, WeightsError, overlap, score,
};
pub use taste::{TasteProfile, Track, normalize};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
