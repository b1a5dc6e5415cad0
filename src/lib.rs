pub mod beacon;
pub mod captions;
pub mod error;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod playback;
pub mod quartile;
pub mod testing;
pub mod verification;

pub use beacon::{BeaconDispatcher, DispatcherConfig, HttpTransport, ReqwestTransport};
pub use captions::{CaptionCue, CaptionTrack};
pub use error::{AdError, Result};
pub use models::{AdCreative, MediaRendition, PlaybackSessionState, Quartile};
pub use orchestrator::{
    ControlSignal, OrchestratorConfig, OrchestratorHandle, PlaybackOrchestrator, SessionEvent,
};
pub use playback::{LinkOpener, MediaPlayer, NullOpener, NullPlayer, PlayerNotice};
pub use verification::{LoggingVerification, VerificationSession};
