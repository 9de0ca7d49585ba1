//! Bundled TCP transport.
//!
//! The routing layer itself is transport-agnostic: anything that can
//! produce a [`Request`](crate::request::Request) and write out a
//! [`Response`](crate::response::Response) can drive a
//! [`Router`](crate::router::Router). This module is the batteries-included
//! transport: a blocking TCP accept loop that parses one request per
//! connection, dispatches it on a worker from the configured
//! [`Runner`](crate::runner::Runner), and writes the response back.
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::net::{Shutdown, TcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::*;

use crate::response::Response;
use crate::router::Router;
use crate::runner::Runner;
use crate::VERSION;

pub mod parser;

#[derive(Debug)]
pub struct ServerError {
    message: String,
}

impl ServerError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "server error: {}", &self.message)
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        ServerError::new(&format!("IOError({})", err))
    }
}

/// A single or multi-threaded TCP server driving a [`Router`].
pub struct TcpServer {
    listener: TcpListener,
    runner: Runner,
    router: Arc<Router>,
    timeout: Option<Duration>,
}

impl TcpServer {
    /// Create a new TCP server.
    ///
    /// # Arguments
    /// * `bind_addr`: Address to listen on, such as "0.0.0.0:8080"
    /// * `n_threads`: Number of threads.
    ///   - 0: create a new thread for each request (not recommended)
    ///   - 1: single-threaded
    ///   - 2+: threadpool with n threads
    /// * `timeout`: network socket timeout
    /// * `router`: request router
    pub fn new(
        bind_addr: &str,
        n_threads: usize,
        timeout: Option<Duration>,
        router: Router,
    ) -> Result<Self, io::Error> {
        Ok(Self {
            listener: TcpListener::bind(bind_addr)?,
            runner: Runner::new(n_threads),
            timeout,
            router: Arc::new(router),
        })
    }

    /// Accept and serve one connection.
    pub fn serve_one(&mut self) -> Result<(), ServerError> {
        let (mut stream, addr) = self.listener.accept()?;
        debug!("accepted connection from {:?}", addr);
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        let router = self.router.clone();
        self.runner.run(move || {
            let start = Instant::now();
            let method;
            let path;
            let mut response = match parser::parse(&mut stream) {
                Ok(request) => {
                    method = request.method.to_string();
                    path = request.path.clone();
                    router.dispatch(request)
                }
                Err(e) => {
                    error!("{}", e);
                    method = "<none>".to_string();
                    path = "<none>".to_string();
                    let mut response = Response::new();
                    response.status(400);
                    response.send_text(&format!("{}", e));
                    response
                }
            };
            let keep_open = response.must_keep_open();
            response.set_header("Server", &format!("expresso/{}", VERSION));
            response.set_header(
                "Connection",
                if keep_open { "keep-alive" } else { "closed" },
            );
            info!(
                "{:?} - {}ms - {} {} {} -> {} ({} bytes)",
                std::thread::current().id(),
                start.elapsed().as_millis(),
                addr,
                method,
                path,
                response.status_code(),
                response.body().len(),
            );
            if let Err(e) = stream.write_all(&response.into_bytes()) {
                error!("IO error: {}", e);
            }
            // On keep_open only the explicit shutdown is skipped; dropping
            // the stream below still closes the socket.
            if !keep_open {
                let _ = stream.shutdown(Shutdown::Both);
            }
        });
        Ok(())
    }

    /// Serve connections forever.
    pub fn serve_forever(&mut self) {
        loop {
            match self.serve_one() {
                Ok(()) => (),
                Err(e) => error!("{}", e),
            }
        }
    }
}
