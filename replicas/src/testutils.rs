use crate::clock::Clock;
use parking_lot::Mutex;
use std::time::{Duration, SystemTime};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Mutex::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_760_000_000)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// Serves `body` for `/{slice}.dblist`, expecting exactly `expected_calls` requests.
pub async fn mount_dblist(server: &MockServer, slice: &str, body: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{slice}.dblist")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Answers `/{slice}.dblist` with a bare status code.
pub async fn mount_status(server: &MockServer, slice: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/{slice}.dblist")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
