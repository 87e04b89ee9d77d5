pub mod api;
pub mod boot;
pub mod episode;
pub mod play;
pub mod profile;
pub mod recording;
pub mod routes;

pub use evertalk_client::{Notice, Notifier, Session, SessionContext};

use crate::recording::Recording;

/// What the recording controller asks the runtime to do.
///
/// The controller never talks to the network or the screen itself; it emits
/// these and the runtime carries them out.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A finished recording, ready for the chat upload. Emitted at most once
    /// per recording. `generation` names the controller that produced it, so
    /// the runtime can drop uploads meant for a play view that is gone.
    Upload { generation: u64, recording: Recording },
    /// Something the user has to see.
    Notify(Notice),
}

/// User-side inputs to the recording controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The microphone button.
    Toggle,
    /// The play view is going away: release the microphone.
    Unmount,
}
