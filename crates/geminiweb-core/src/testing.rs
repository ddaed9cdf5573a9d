//! In-memory fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::cache::Clock;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::GeminiError;

pub fn ok_response(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: Vec::new(),
        body: body.as_bytes().to_vec(),
    }
}

pub fn status_response(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: Vec::new(),
    }
}

pub fn with_set_cookie(mut resp: HttpResponse, cookie: &str) -> HttpResponse {
    resp.headers.push(("set-cookie".to_string(), cookie.to_string()));
    resp
}

pub fn app_page(token: &str) -> HttpResponse {
    ok_response(&format!(
        r#"<html><script>WIZ_global_data = {{"SNlM0e":"{token}","other":"x"}};</script></html>"#
    ))
}

type Scripted = Result<HttpResponse, GeminiError>;

/// Transport answering by exact URL. Queued responses are consumed in
/// order; the last one for a URL repeats once the queue is drained.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, response: HttpResponse) -> Self {
        self.push(url, Ok(response));
        self
    }

    pub fn on_error(self, url: &str, error: GeminiError) -> Self {
        self.push(url, Err(error));
        self
    }

    pub fn push(&self, url: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, GeminiError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&url)
            .ok_or_else(|| GeminiError::Transport(format!("no route for {url}")))?;
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| GeminiError::Transport(format!("no route for {url}")))?
        }
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Generate-endpoint reply with one candidate per `(id, text)` pair.
pub fn generate_response(cid: &str, rid: &str, candidates: &[(&str, &str)]) -> HttpResponse {
    let candidates: Vec<serde_json::Value> = candidates
        .iter()
        .map(|(id, text)| serde_json::json!([id, [text]]))
        .collect();
    let body = serde_json::json!([null, [cid, rid], null, null, candidates]);
    let envelope = serde_json::json!([
        ["wrb.fr", null, body.to_string()],
        ["di", 42],
    ]);
    ok_response(&format!(")]}}'\n\n{envelope}\n"))
}
