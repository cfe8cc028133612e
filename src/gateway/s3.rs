//! S3 object store
//!
//! Path-style client for MinIO and other S3-compatible services. Requests are
//! signed with AWS Signature Version 4; listings use ListObjectsV2.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use hmac::{Hmac, Mac};
use log::{debug, warn};
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode, Url};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;
use std::sync::LazyLock;

use super::{ListRequest, ObjectBody, ObjectItem, ObjectStat, ObjectStore};
use crate::config::StoreConfig;
use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound S3 accepts for `max-keys`
const MAX_KEYS_PER_PAGE: usize = 1000;

static CONTENTS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Contents>(.*?)</Contents>").expect("valid regex"));
static COMMON_PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<CommonPrefixes>\s*<Prefix>(.*?)</Prefix>\s*</CommonPrefixes>")
        .expect("valid regex")
});
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Key>(.*?)</Key>").expect("valid regex"));
static SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Size>(\d+)</Size>").expect("valid regex"));
static TRUNCATED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<IsTruncated>(true|false)</IsTruncated>").expect("valid regex"));
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<NextContinuationToken>(.*?)</NextContinuationToken>").expect("valid regex")
});

/// One page of a ListObjectsV2 response
#[derive(Debug, Default, PartialEq)]
struct ListPage {
    items: Vec<ObjectItem>,
    next_token: Option<String>,
}

pub struct S3Store {
    client: Client,
    /// `scheme://host[:port]`
    endpoint: String,
    /// Value of the signed `host` header; carries the port only when it is
    /// not the scheme's default, as reqwest does
    host: String,
    /// Path the service is mounted under, without trailing slash
    base_path: String,
    region: String,
    access_key: String,
    secret_key: String,
}

impl S3Store {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        let url = Url::parse(config.endpoint.trim())
            .map_err(|e| StoreError::Unavailable(format!("Invalid endpoint {}: {}", config.endpoint, e)))?;
        let host_name = url
            .host_str()
            .ok_or_else(|| StoreError::Unavailable(format!("Endpoint {} has no host", config.endpoint)))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };
        let endpoint = format!("{}://{}", url.scheme(), host);
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            endpoint,
            host,
            base_path,
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Builds the `Authorization` header value for a request
    fn authorization(
        &self,
        method: &str,
        uri: &str,
        query: &str,
        headers: &BTreeMap<String, String>,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> String {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, uri, query, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.secret_key, &date_stamp, &self.region);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, credential_scope, signed_headers, signature
        )
    }

    /// Sends a signed request
    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        query: &[(&str, String)],
        extra_headers: &[(&str, String)],
        body: Bytes,
    ) -> Result<Response, StoreError> {
        let uri = format!("{}{}", self.base_path, canonical_uri(bucket, key));
        let query_string = canonical_query(query);
        let payload_hash = hex::encode(Sha256::digest(&body));
        let now = Utc::now();

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert(
            "x-amz-date".to_string(),
            now.format("%Y%m%dT%H%M%SZ").to_string(),
        );
        for (name, value) in extra_headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }

        let authorization = self.authorization(
            method.as_str(),
            &uri,
            &query_string,
            &headers,
            &payload_hash,
            now,
        );

        let url = if query_string.is_empty() {
            format!("{}{}", self.endpoint, uri)
        } else {
            format!("{}{}?{}", self.endpoint, uri, query_string)
        };
        debug!("S3 {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, authorization);
        for (name, value) in &headers {
            // reqwest derives Host from the URL
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        request
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Request to {} failed: {}", url, e)))
    }

    async fn list_page(
        &self,
        bucket: &str,
        request: &ListRequest,
        max_keys: usize,
        token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut query = vec![
            ("list-type", "2".to_string()),
            ("prefix", request.prefix.clone()),
            ("max-keys", max_keys.to_string()),
        ];
        if !request.recursive {
            query.push(("delimiter", "/".to_string()));
        }
        if let Some(token) = token {
            query.push(("continuation-token", token.to_string()));
        }

        let response = self
            .send(Method::GET, bucket, "", &query, &[], Bytes::new())
            .await?;

        match response.status() {
            StatusCode::OK => {
                let xml = response
                    .text()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                Ok(parse_list_page(&xml))
            }
            StatusCode::NOT_FOUND => Err(StoreError::BucketNotFound(bucket.to_string())),
            status => Err(unexpected(status, response).await),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let response = self
            .send(Method::HEAD, bucket, "", &[], &[], Bytes::new())
            .await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(unexpected(status, response).await),
        }
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>, StoreError> {
        let response = self
            .send(Method::HEAD, bucket, key, &[], &[], Bytes::new())
            .await?;
        match response.status() {
            status if status.is_success() => {
                let size = response
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                Ok(Some(ObjectStat { size }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(unexpected(status, response).await),
        }
    }

    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<Vec<ObjectItem>, StoreError> {
        let mut items: Vec<ObjectItem> = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page_size = match request.limit {
                Some(limit) => limit.saturating_sub(items.len()).clamp(1, MAX_KEYS_PER_PAGE),
                None => MAX_KEYS_PER_PAGE,
            };
            let page = self
                .list_page(bucket, request, page_size, token.as_deref())
                .await?;
            items.extend(page.items);

            if request.limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(limit) = request.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let headers = [(CONTENT_TYPE.as_str(), content_type.to_string())];
        let response = self
            .send(Method::PUT, bucket, key, &[], &headers, body)
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::BucketNotFound(bucket.to_string())),
            status => Err(unexpected(status, response).await),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        let response = self
            .send(Method::GET, bucket, key, &[], &[], Bytes::new())
            .await?;
        match response.status() {
            status if status.is_success() => {
                let size = response.content_length().ok_or_else(|| {
                    StoreError::Unavailable(format!("No content length for {}", key))
                })?;
                let stream = response.bytes_stream().map_err(io::Error::other).boxed();
                Ok(ObjectBody::new(size, stream))
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            status => Err(unexpected(status, response).await),
        }
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        let headers = [("x-amz-copy-source", canonical_uri(bucket, from))];
        let response = self
            .send(Method::PUT, bucket, to, &[], &headers, Bytes::new())
            .await?;
        match response.status() {
            status if status.is_success() => {
                // CopyObject may report a failure inside a 200 response
                let body = response
                    .text()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                if body.contains("<Error>") {
                    warn!("Copy {} -> {} failed: {}", from, to, body);
                    return Err(StoreError::Unavailable(format!(
                        "Copy {} -> {} failed",
                        from, to
                    )));
                }
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(from.to_string())),
            status => Err(unexpected(status, response).await),
        }
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let response = self
            .send(Method::DELETE, bucket, key, &[], &[], Bytes::new())
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            status => Err(unexpected(status, response).await),
        }
    }
}

async fn unexpected(status: StatusCode, response: Response) -> StoreError {
    let body = response.text().await.unwrap_or_default();
    warn!("Object store responded {}: {}", status, body);
    StoreError::Unavailable(format!("Object store responded {}", status))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(secret: &str, date_stamp: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

/// `/bucket/key` with every key segment percent-encoded
fn canonical_uri(bucket: &str, key: &str) -> String {
    if key.is_empty() {
        return format!("/{}", bucket);
    }
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("/{}/{}", bucket, encoded.join("/"))
}

/// Query string sorted by parameter name, as SigV4 requires
fn canonical_query(params: &[(&str, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn parse_list_page(xml: &str) -> ListPage {
    let mut items = Vec::new();

    for cap in CONTENTS_PATTERN.captures_iter(xml) {
        let content = &cap[1];
        let Some(key) = KEY_PATTERN.captures(content).map(|c| unescape_xml(&c[1])) else {
            continue;
        };
        let size = SIZE_PATTERN
            .captures(content)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);
        items.push(ObjectItem::new(key, size));
    }

    for cap in COMMON_PREFIX_PATTERN.captures_iter(xml) {
        items.push(ObjectItem::new(unescape_xml(&cap[1]), 0));
    }

    let truncated = TRUNCATED_PATTERN
        .captures(xml)
        .is_some_and(|c| &c[1] == "true");
    let next_token = if truncated {
        TOKEN_PATTERN.captures(xml).map(|c| unescape_xml(&c[1]))
    } else {
        None
    };

    ListPage { items, next_token }
}
