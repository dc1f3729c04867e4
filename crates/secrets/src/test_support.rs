//! Stub transport shared by the unit tests

use crate::http::{HttpClient, HttpRequest, HttpResponse, TransportError};
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Answers requests with a closure and records every request it sees
pub struct StubHttp {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubHttp {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A transport that fails the test if it is ever used
    pub fn unreachable() -> Arc<Self> {
        Self::new(|request| panic!("unexpected request to {}", request.url))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpClient for StubHttp {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}
