mod client;
pub mod error;
pub mod notice;
pub mod session;

pub use evertalk_types as types;
pub use client::config::{Config, ConfigBuilder};
pub use client::transport::{
    ApiRequest, ApiResponse, Audience, Body, FormField, ReqwestTransport, Transport,
};
pub use client::{connect, ApiClient, AudioAttachment};
pub use error::{ApiError, TransportError};
pub use notice::{ChannelNotifier, LogNotifier, Notice, Notifier};
pub use session::{Session, SessionContext};
