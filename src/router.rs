//! Path based request routing.
//!
//! The router owns a per-method table of (template, handler) pairs, tried
//! in registration order: the first structural match wins, so a later
//! template that is a more specific case of an earlier one is unreachable.
//! For `GET`, static file resolution runs before any template and
//! short-circuits routing entirely on a hit.
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};

use crate::files;
use crate::request::{Method, Request};
use crate::response::Response;
use crate::route::RouteTemplate;

/// Error returned by a failing handler. The router converts it to a 500
/// response; it never propagates further.
#[derive(Debug)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.message)
    }
}

impl From<io::Error> for HandlerError {
    fn from(err: io::Error) -> Self {
        HandlerError::new(&err.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::new(message)
    }
}

pub type HandlerResult = std::result::Result<(), HandlerError>;

/// A Handler implements one HTTP endpoint: it reads the [`Request`] and
/// accumulates status, headers and body on the [`Response`].
pub trait Handler: Send + Sync {
    fn handle(&self, request: &mut Request, response: &mut Response) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync,
{
    fn handle(&self, request: &mut Request, response: &mut Response) -> HandlerResult {
        (self)(request, response)
    }
}

struct Route {
    template: RouteTemplate,
    // Arc because `with_all` registers one handler under every method.
    handler: Arc<dyn Handler>,
}

/// Router dispatches requests to handlers by method and path template.
///
/// # Usage - route templates
/// * `/foo`: matches exactly /foo
/// * `/foo/:name`: matches /foo/bar, binds `name` = "bar"
/// * parameters never match across `/` or into a query string
///
/// # Example
/// ```
/// use expresso::prelude::*;
///
/// fn handle_hello(req: &mut Request, res: &mut Response) -> HandlerResult {
///     let name = req.param("name").unwrap_or("world").to_string();
///     res.send_text(&format!("Hello, {}!", name));
///     Ok(())
/// }
///
/// let router = Router::new().with_get("/hello/:name", handle_hello);
///
/// let mut request = Request::default();
/// request.path = "/hello/Bob".to_string();
/// let response = router.dispatch(request);
/// assert_eq!(response.body(), b"Hello, Bob!");
/// ```
pub struct Router {
    root_dir: Option<PathBuf>,
    routes: HashMap<Method, Vec<Route>>,
}

const ALL_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

impl Router {
    pub fn new() -> Self {
        Self {
            root_dir: None,
            routes: HashMap::new(),
        }
    }

    /// Serve static files under this directory for GET requests, before any
    /// route matching. A directory serves its `index.html`.
    pub fn with_static_root(mut self, root: &Path) -> Result<Self, io::Error> {
        self.root_dir = Some(root.canonicalize()?);
        Ok(self)
    }

    /// Register a handler for one method and path template. Templates are
    /// tried in registration order.
    pub fn route<H>(mut self, method: Method, template: &str, handler: H) -> Self
    where
        H: 'static + Handler,
    {
        self.add(method, template, Arc::new(handler));
        self
    }

    pub fn with_get<H: 'static + Handler>(self, template: &str, handler: H) -> Self {
        self.route(Method::GET, template, handler)
    }

    pub fn with_post<H: 'static + Handler>(self, template: &str, handler: H) -> Self {
        self.route(Method::POST, template, handler)
    }

    pub fn with_put<H: 'static + Handler>(self, template: &str, handler: H) -> Self {
        self.route(Method::PUT, template, handler)
    }

    pub fn with_patch<H: 'static + Handler>(self, template: &str, handler: H) -> Self {
        self.route(Method::PATCH, template, handler)
    }

    pub fn with_delete<H: 'static + Handler>(self, template: &str, handler: H) -> Self {
        self.route(Method::DELETE, template, handler)
    }

    /// Register the same handler under GET, POST, PUT, PATCH and DELETE.
    pub fn with_all<H: 'static + Handler>(mut self, template: &str, handler: H) -> Self {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        for method in ALL_METHODS.iter() {
            self.add(*method, template, handler.clone());
        }
        self
    }

    fn add(&mut self, method: Method, template: &str, handler: Arc<dyn Handler>) {
        self.routes
            .entry(method)
            .or_insert_with(Vec::new)
            .push(Route {
                template: RouteTemplate::compile(template),
                handler,
            });
    }

    /// Dispatch one request and return the accumulated response. Handler
    /// failures, including panics, are converted to a 500 response here;
    /// nothing escapes past this boundary.
    pub fn dispatch(&self, mut request: Request) -> Response {
        let mut response = Response::new();

        if request.method == Method::GET {
            if let Some(root) = &self.root_dir {
                if let Some((contents, mime)) = files::resolve(root, &request.path) {
                    debug!("GET {} served from static root", &request.path);
                    response.set_header("Content-Type", mime);
                    response.send_bytes(contents);
                    return response;
                }
            }
        }

        if let Some(routes) = self.routes.get(&request.method) {
            for route in routes {
                if let Some(params) = route.template.matches(&request.path) {
                    debug!(
                        "{} {} matched template {}",
                        request.method,
                        &request.path,
                        route.template.raw()
                    );
                    for (name, value) in params {
                        request.set_param(&name, value);
                    }
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        route.handler.handle(&mut request, &mut response)
                    }));
                    match outcome {
                        Ok(Ok(())) => (),
                        Ok(Err(e)) => {
                            error!(
                                "handler error for {} {}: {}",
                                request.method, &request.path, e
                            );
                            fault(&mut response, &e.to_string());
                        }
                        Err(payload) => {
                            let message = panic_message(payload);
                            error!(
                                "handler panicked for {} {}: {}",
                                request.method, &request.path, message
                            );
                            fault(&mut response, &message);
                        }
                    }
                    return response;
                }
            }
        }

        debug!("no route matches {} {}", request.method, &request.path);
        response.status(404);
        response.send_text(&format!("{} not found", &request.path));
        response
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a failed handler into a 500, unless a response was already sent,
/// in which case the first flush wins and the failure is only logged.
fn fault(response: &mut Response, message: &str) {
    if response.is_sent() {
        return;
    }
    response.status(500);
    response.send_text(&format!("internal server error: {}", message));
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn get(path: &str) -> Request {
        let mut request = Request::default();
        request.path = path.to_string();
        request
    }

    fn echo_param(name: &'static str) -> impl Handler {
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let value = req.param(name).unwrap_or("<unbound>").to_string();
            res.send_text(&value);
            Ok(())
        }
    }

    fn send_literal(text: &'static str) -> impl Handler {
        move |_: &mut Request, res: &mut Response| -> HandlerResult {
            res.send_text(text);
            Ok(())
        }
    }

    #[test]
    fn test_path_params_bound() {
        fn handle(req: &mut Request, res: &mut Response) -> HandlerResult {
            let id = req.param("id").unwrap().to_string();
            let post_id = req.param("postId").unwrap().to_string();
            res.send_text(&format!("{}/{}", id, post_id));
            Ok(())
        }
        let router = Router::new().with_get("/users/:id/posts/:postId", handle);
        let response = router.dispatch(get("/users/42/posts/7"));
        assert_eq!(response.body(), b"42/7");
    }

    #[test]
    fn test_registration_order_precedence() {
        // /a/:x registered first shadows the literal /a/b forever.
        let router = Router::new()
            .with_get("/a/:x", echo_param("x"))
            .with_get("/a/b", send_literal("literal"));
        let response = router.dispatch(get("/a/b"));
        assert_eq!(response.body(), b"b");
    }

    #[test]
    fn test_methods_route_independently() {
        let router = Router::new()
            .with_get("/thing", send_literal("got"))
            .with_post("/thing", send_literal("posted"));
        let mut request = get("/thing");
        request.method = Method::POST;
        assert_eq!(router.dispatch(request).body(), b"posted");
        assert_eq!(router.dispatch(get("/thing")).body(), b"got");
    }

    #[test]
    fn test_no_route_yields_404_with_path() {
        let router = Router::new().with_get("/known", send_literal("known"));
        let response = router.dispatch(get("/unknown/path"));
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.body(), b"/unknown/path not found");
    }

    #[test]
    fn test_unregistered_method_yields_404() {
        let router = Router::new().with_get("/thing", send_literal("got"));
        let mut request = get("/thing");
        request.method = Method::DELETE;
        assert_eq!(router.dispatch(request).status_code(), 404);
    }

    #[test]
    fn test_handler_error_becomes_500() {
        fn handle(_: &mut Request, _: &mut Response) -> HandlerResult {
            Err(HandlerError::new("database is on fire"))
        }
        let router = Router::new().with_get("/fail", handle);
        let response = router.dispatch(get("/fail"));
        assert_eq!(response.status_code(), 500);
        assert_eq!(
            response.body(),
            &b"internal server error: database is on fire"[..]
        );
    }

    #[test]
    fn test_handler_panic_does_not_escape() {
        fn handle(_: &mut Request, _: &mut Response) -> HandlerResult {
            panic!("boom");
        }
        let router = Router::new().with_get("/panic", handle);
        let response = router.dispatch(get("/panic"));
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.body(), b"internal server error: boom");
    }

    #[test]
    fn test_error_after_send_keeps_first_flush() {
        fn handle(_: &mut Request, res: &mut Response) -> HandlerResult {
            res.send_text("already out");
            Err(HandlerError::new("too late"))
        }
        let router = Router::new().with_get("/late", handle);
        let response = router.dispatch(get("/late"));
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body(), b"already out");
    }

    #[test]
    fn test_with_all_registers_every_method() {
        fn handle(req: &mut Request, res: &mut Response) -> HandlerResult {
            res.send_text(&req.method.to_string());
            Ok(())
        }
        let router = Router::new().with_all("/any", handle);
        for method in ALL_METHODS.iter() {
            let mut request = get("/any");
            request.method = *method;
            let response = router.dispatch(request);
            assert_eq!(response.body(), method.to_string().as_bytes());
        }
    }

    #[test]
    fn test_static_file_short_circuits_routing() {
        let root = tempfile::tempdir().unwrap().into_path();
        fs::write(root.join("page.html"), "<h1>hi</h1>").unwrap();
        let router = Router::new()
            .with_static_root(&root)
            .unwrap()
            .with_get("/page.html", send_literal("from handler"));

        let response = router.dispatch(get("/page.html"));
        assert_eq!(response.body(), b"<h1>hi</h1>");
        assert_eq!(response.header("Content-Type"), Some("text/html"));

        // Static resolution only applies to GET.
        let mut request = get("/page.html");
        request.method = Method::POST;
        assert_eq!(router.dispatch(request).status_code(), 404);
    }
}
