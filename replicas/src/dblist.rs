use crate::histogram;
use crate::metrics_defs::DBLIST_FETCH_DURATION;
use crate::types::{DbList, SliceId};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Instant;

/// Hard bound on the number of dblists fetched in one rebuild.
pub const MAX_SLICES: u32 = 50;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("dblist request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dblist source returned {status} for {url}")]
    UpstreamStatus { url: String, status: StatusCode },
}

/// Fetches the numbered per-slice dblists (`s1.dblist`, `s2.dblist`, ...)
/// and merges them into one mapping.
pub struct DbListSource {
    client: reqwest::Client,
    base_url: String,
    max_slices: u32,
}

impl DbListSource {
    pub fn new(base_url: &str, max_slices: u32) -> Self {
        DbListSource {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_slices: max_slices.min(MAX_SLICES),
        }
    }

    fn slice_url(&self, slice: &str) -> String {
        format!("{}/{slice}.dblist", self.base_url)
    }

    /// Fetches lists in increasing order until the source reports a list as
    /// absent or the slice bound is reached. A database listed more than once
    /// keeps the slice of the last list it appears in.
    ///
    /// Server errors and transport failures abort the whole fetch; a partial
    /// mapping is never returned.
    pub async fn fetch(&self) -> Result<DbList, FetchError> {
        let start = Instant::now();
        let mut databases: HashMap<String, SliceId> = HashMap::new();
        let mut fetched = 0;

        for i in 1..=self.max_slices {
            let slice = format!("s{i}");
            let url = self.slice_url(&slice);
            let response = self.client.get(&url).send().await?;
            let status = response.status();

            if status.is_server_error() {
                return Err(FetchError::UpstreamStatus { url, status });
            }

            if status != StatusCode::OK && status != StatusCode::NOT_MODIFIED {
                tracing::debug!(%url, %status, "No more dblists");
                break;
            }

            let body = response.text().await?;
            for database in parse_dblist(&body) {
                databases.insert(database.to_string(), slice.clone());
            }

            fetched += 1;
            tracing::debug!(%url, "Fetched dblist");
        }

        histogram!(DBLIST_FETCH_DURATION).record(start.elapsed().as_secs_f64());
        tracing::info!(
            slices = fetched,
            databases = databases.len(),
            "Fetched dblists"
        );

        Ok(DbList::new(databases))
    }
}

/// Database names listed in one dblist body. Blank lines and `#` comments
/// are skipped.
pub fn parse_dblist(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_dblist() {
        let body = "enwiki\n#comment\n\n  ptwiki  \r\n   # indented comment\n";
        assert_eq!(parse_dblist(body).collect::<Vec<_>>(), vec!["enwiki", "ptwiki"]);
    }

    #[tokio::test]
    async fn test_fetch_until_missing_list() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/s1.dblist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("enwiki\n#comment\n\nptwiki"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s2.dblist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("dewiki"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s3.dblist"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s4.dblist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("frwiki"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let source = DbListSource::new(&format!("{}/", mock_server.uri()), MAX_SLICES);
        let db_list = source.fetch().await.unwrap();

        let expected: DbList = [("enwiki", "s1"), ("ptwiki", "s1"), ("dewiki", "s2")]
            .into_iter()
            .collect();
        assert_eq!(db_list, expected);
    }

    #[tokio::test]
    async fn test_fetch_is_bounded() {
        let mock_server = MockServer::start().await;

        // Every list answers OK, and every list claims the same database.
        Mock::given(method("GET"))
            .and(path_regex(r"^/s\d+\.dblist$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("enwiki\n"))
            .expect(u64::from(MAX_SLICES))
            .mount(&mock_server)
            .await;

        let source = DbListSource::new(&mock_server.uri(), 1000);
        let db_list = source.fetch().await.unwrap();

        assert_eq!(db_list.len(), 1);
        assert_eq!(db_list.slice("enwiki"), Some("s50"));
    }

    #[tokio::test]
    async fn test_not_modified_continues() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/s1.dblist"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s2.dblist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("dewiki\n"))
            .mount(&mock_server)
            .await;

        let source = DbListSource::new(&mock_server.uri(), MAX_SLICES);
        let db_list = source.fetch().await.unwrap();

        assert_eq!(db_list.len(), 1);
        assert_eq!(db_list.slice("dewiki"), Some("s2"));
    }

    #[tokio::test]
    async fn test_server_error_aborts_fetch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/s1.dblist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("enwiki\n"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s2.dblist"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = DbListSource::new(&mock_server.uri(), MAX_SLICES);
        let err = source.fetch().await.unwrap_err();

        match err {
            FetchError::UpstreamStatus { url, status } => {
                assert!(url.ends_with("/s2.dblist"));
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
