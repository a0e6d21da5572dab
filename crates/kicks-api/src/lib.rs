pub mod auth;
pub mod conversations;
pub mod error;
pub mod extract;
pub mod images;
pub mod listings;
pub mod matching;
pub mod middleware;
pub mod notifications;
pub mod requests;
pub mod routes;
pub mod state;
pub mod storage;
pub mod users;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::{AppState, AppStateInner};
