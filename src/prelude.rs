pub use crate::body::UploadedFile;
pub use crate::json::{Json, ToJsonObject};
pub use crate::request::{Header, Method, Request};
pub use crate::response::Response;
pub use crate::router::{Handler, HandlerError, HandlerResult, Router};
pub use crate::session::{Session, SessionManager};
