//! Request and response bodies exchanged with the Evertalk backend.
//!
//! Every endpoint gets its own type. Required fields are not defaulted, so a
//! body with a missing or mistyped field fails to decode instead of surfacing
//! half-filled values.
pub mod auth;
pub mod chat;
pub mod episode;
pub mod profile;

pub use auth::AuthCheck;
pub use chat::{ChatTurn, EpisodeSession};
pub use episode::{EpisodeDetail, EpisodeList, StartEpisodeRequest};
pub use profile::{Gender, ProfileUpdate};
