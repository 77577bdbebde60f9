pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod quota;
pub mod session;

pub use config::Config;
pub use context::ConversationContext;
pub use error::{MeteringError, QuotaKind};
pub use http::{create_router, AppState, StartConversationError};
pub use quota::{NatsQuotaGateway, QuotaGateway, UserQuotaState};
pub use session::{CountdownSnapshot, Session, SessionController, SessionEvent};
