use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use aws_sdk_s3::{error::SdkError, primitives::ByteStream};
use thiserror::Error;
use tokio::sync::Mutex;

/// StorageError
///
/// Failures of the external image provider. `Unavailable` covers timeouts and
/// connection failures the caller may retry; `Rejected` is the provider saying no.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("storage provider unavailable: {0}")]
    Unavailable(String),

    #[error("storage provider rejected the request: {0}")]
    Rejected(String),
}

// 1. StorageService Contract
/// StorageService
///
/// The abstract contract for the object store holding uploaded images. The real
/// S3 client and the in-memory mock are interchangeable behind it.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in `Env::Local` to provision MinIO.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError>;

    /// Stores `data` under `key` and returns the public URL referencing it.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Deletes the object a URL previously returned by `put_object` refers to.
    /// URLs this store did not issue are ignored.
    async fn delete_object(&self, url: &str) -> Result<(), StorageError>;

    /// The sanitized object key behind a URL this store issued, `None` for any
    /// other URL.
    fn key_of(&self, url: &str) -> Option<String>;
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// Talks to any S3-compatible endpoint. `force_path_style(true)` is required for MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3StorageClient {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

}

/// Timeouts and dispatch failures never reached the provider: retryable.
fn classify<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::Unavailable(format!("{err:?}"))
        }
        _ => StorageError::Rejected(format!("{err:?}")),
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// Calls CreateBucket and treats "already exists/owned" as success.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        match self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let already_there = err.as_service_error().is_some_and(|e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                });
                if already_there {
                    Ok(())
                } else {
                    Err(classify(err))
                }
            }
        }
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = sanitize_key(key);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(classify)?;

        Ok(format!("{}/{}", self.public_url, key))
    }

    async fn delete_object(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_of(url) else {
            tracing::debug!(url, "not an object of this store, skipping delete");
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    fn key_of(&self, url: &str) -> Option<String> {
        issued_key(&self.public_url, url)
    }
}

fn issued_key(base_url: &str, url: &str) -> Option<String> {
    url.strip_prefix(base_url)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(sanitize_key)
        .filter(|key| !key.is_empty())
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`, empty segments) from a key.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Keeps objects in memory so upload and delete flows can be tested without S3.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When set, every operation fails with this error.
    pub fail_with: Option<StorageError>,
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

const MOCK_BASE_URL: &str = "http://localhost:9000/mock-bucket";

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing(error: StorageError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    /// Returns the object an issued URL points at, if it is still stored.
    pub async fn get(&self, url: &str) -> Option<StoredObject> {
        let key = issued_key(MOCK_BASE_URL, url)?;
        self.objects.lock().await.get(&key).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    fn check(&self) -> Result<(), StorageError> {
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        self.check()
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.check()?;
        let key = sanitize_key(key);
        self.objects.lock().await.insert(
            key.clone(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{MOCK_BASE_URL}/{key}"))
    }

    async fn delete_object(&self, url: &str) -> Result<(), StorageError> {
        self.check()?;
        if let Some(key) = self.key_of(url) {
            self.objects.lock().await.remove(&key);
        }
        Ok(())
    }

    fn key_of(&self, url: &str) -> Option<String> {
        issued_key(MOCK_BASE_URL, url)
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
