//! An express-style micro web framework. This is a learning project, use at your own risk.
//! * Path-template [request routing](crate::router::Router) with `:name` parameters
//! * [Body decoding](crate::body) for URL-encoded and multipart forms
//! * Write-only [JSON serialization](crate::json) with ordered keys
//! * Cookie-identified [server-side sessions](crate::session::SessionManager)
//! * Static file serving and a multi-threaded [TCP server](crate::server::TcpServer)
//!
//! # Example
//! ```
//! use expresso::json::Json;
//! use expresso::prelude::*;
//!
//! fn handle_greet(req: &mut Request, res: &mut Response) -> HandlerResult {
//!     let name = req.param("name").unwrap_or("world").to_string();
//!     res.send_json(&Json::object().with("greeting", format!("Hello, {}!", name)));
//!     Ok(())
//! }
//!
//! fn handle_signup(req: &mut Request, res: &mut Response) -> HandlerResult {
//!     let user = req.form("user").unwrap_or("").to_string();
//!     res.status(201);
//!     res.send_text(&format!("welcome, {}", user));
//!     Ok(())
//! }
//!
//! let router = Router::new()
//!     .with_get("/greet/:name", handle_greet)
//!     .with_post("/signup", handle_signup);
//!
//! let mut request = Request::default();
//! request.path = "/greet/Bob".to_string();
//! let response = router.dispatch(request);
//! assert_eq!(response.body(), br#"{"greeting":"Hello, Bob!"}"#);
//!
//! // To serve over TCP:
//! // let mut server = expresso::server::TcpServer::new("0.0.0.0:8080", 4, None, router).unwrap();
//! // server.serve_forever();
//! ```
pub mod body;
pub mod files;
pub mod json;
pub mod prelude;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod runner;
pub mod server;
pub mod session;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
