pub mod brief;
pub mod conversation;
pub mod engine;
pub mod registry;
pub mod variants;

pub use brief::{
    CampaignBrief, DEFAULT_LANGUAGE, DEFAULT_MAX_LENGTH, DEFAULT_TONE, MAX_LENGTH_CEILING,
};
pub use conversation::{Conversation, Turn, TurnRole};
pub use engine::{Session, SessionEngine, SessionError, SessionSnapshot};
pub use registry::{SessionRegistry, SharedSession};
pub use variants::{MAX_VARIANTS, PoolError, VariantPool};
