pub mod classifier;
pub mod enricher;
pub mod error;
pub mod llm_client;
pub mod playback;
pub mod registry;
pub mod session;

pub use classifier::{ClassificationResult, classify};
pub use enricher::{ContextEnricher, DECLINE_MESSAGE, DEFAULT_SYSTEM_PROMPT};
pub use error::{GenerationError, RegistryLoadError, RenderError, SessionError};
pub use llm_client::{
    GenerationAdapter, GenerationRequest, GenerationSettings, OpenAICompatibleClient,
    ResponseStream, ScriptedAdapter, ScriptedReply,
};
pub use playback::{
    AudioClip, AudioRenderRequest, PlaybackCoordinator, PlaybackPrompt, RenderOutcome,
    SpeechRenderer,
};
pub use registry::{Pillar, PillarSource, PillarStatus, Registry};
pub use session::{
    DeclinePolicy, Reply, ResponseKind, Role, Session, SessionMode, SessionOptions,
    SessionStatus, Turn,
};
