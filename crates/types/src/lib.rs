pub mod conversation;
pub mod error;
pub mod flag;
pub mod ids;
pub mod stage;

pub use conversation::{
    ConversationMessage, ConversationMeta, MessageRole, SendMessageRequest, SendMessageResponse,
    StageMeta,
};
pub use error::{TypesError, TypesResult};
pub use flag::coerce_flag;
pub use ids::CorrelationId;
pub use stage::Stage;
