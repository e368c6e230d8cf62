//! HTTP client capability abstraction (DESIGN NOTES §9, SPEC_FULL.md §4.7).

use std::io::Read;
use std::time::Duration;

/// Response shape the Sender state machine needs, decoupled from `reqwest`
/// so a mock implementation can drive every branch of spec.md §4.4.
pub struct PostResponse {
    pub status: u16,
    pub body_snippet: String,
}

pub trait HttpClient: Send + Sync {
    /// POST `body` to `url` with the `x-filename` header, per spec.md §6.
    fn post_file(
        &self,
        url: &str,
        filename: &str,
        body: Box<dyn Read + Send>,
        timeout: Duration,
    ) -> Result<PostResponse, crate::error::UploadError>;
}

pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    verify_ssl: bool,
}

impl ReqwestClient {
    pub fn new(verify_ssl: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;
        Ok(Self { client, verify_ssl })
    }
}

impl HttpClient for ReqwestClient {
    fn post_file(
        &self,
        url: &str,
        filename: &str,
        body: Box<dyn Read + Send>,
        timeout: Duration,
    ) -> Result<PostResponse, crate::error::UploadError> {
        let _ = self.verify_ssl; // baked into `client` at construction time
        let response = self
            .client
            .post(url)
            .header("x-filename", filename.to_string())
            .header("Content-Type", "application/octet-stream")
            .timeout(timeout)
            .body(reqwest::blocking::Body::new(body))
            .send()?;

        let status = response.status().as_u16();
        let text = response.text().unwrap_or_default();
        let body_snippet = text.chars().take(100).collect();

        Ok(PostResponse {
            status,
            body_snippet,
        })
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Scripted sequence of responses/errors, returned in order. Used by the
    /// Sender state-machine tests to exercise retry-then-success (S4) and
    /// terminal-failure (S6) without a real network.
    pub struct ScriptedClient {
        script: Mutex<Vec<ScriptedResult>>,
        pub calls: Mutex<Vec<String>>,
    }

    pub enum ScriptedResult {
        Status(u16),
        /// A non-retryable client-side exception (redirect-policy violation,
        /// request-build error, etc.) rather than a real network
        /// timeout/connect failure — those need a genuine `reqwest::Error`
        /// and can't be scripted here.
        NonNetworkError,
    }

    impl ScriptedClient {
        pub fn new(script: Vec<ScriptedResult>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for ScriptedClient {
        fn post_file(
            &self,
            _url: &str,
            filename: &str,
            mut body: Box<dyn Read + Send>,
            _timeout: Duration,
        ) -> Result<PostResponse, crate::error::UploadError> {
            let mut buf = Vec::new();
            let _ = body.read_to_end(&mut buf);
            self.calls.lock().unwrap().push(filename.to_string());

            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(PostResponse {
                    status: 200,
                    body_snippet: String::new(),
                });
            }
            match script.remove(0) {
                ScriptedResult::Status(status) => Ok(PostResponse {
                    status,
                    body_snippet: String::new(),
                }),
                ScriptedResult::NonNetworkError => Err(crate::error::UploadError::Os(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated non-network client exception",
                ))),
            }
        }
    }
}
