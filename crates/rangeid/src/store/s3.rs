use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Region, http::HttpResponse},
    error::SdkError,
    primitives::ByteStream,
};
use tokio::runtime::{Builder, Runtime};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::store::{OptimisticStore, SEED_VALUE};

const CONTENT_TYPE: &str = "text/plain";

/// Errors produced by [`S3Store`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum S3StoreError {
    /// The service rejected a request for a reason other than a failed
    /// precondition.
    #[error(transparent)]
    Service(#[from] aws_sdk_s3::Error),

    /// The object body could not be streamed.
    #[error("failed to read object body: {0}")]
    Body(#[from] aws_sdk_s3::primitives::ByteStreamError),

    /// The object was still missing after seeding it.
    #[error("object `{key}` is missing after seeding")]
    Missing {
        /// The object key.
        key: String,
    },

    /// The private runtime driving the SDK could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// An [`OptimisticStore`] keeping one object per scope in an S3 bucket.
///
/// - **Seeding** uses `PutObject` with `If-None-Match: *`, which succeeds for
///   exactly one caller. A `412`/`409` from a losing seed is absorbed and the
///   object is read again.
/// - **Fencing** uses the entity tag returned by `GetObject`; writes carry
///   `If-Match: <etag>` and a `412`/`409` answer maps to a fencing conflict.
///
/// The SDK is asynchronous while [`OptimisticStore`] is blocking, so each
/// store owns a small Tokio runtime and blocks on it. Do **not** call it from
/// inside an async task; wrap calls in `spawn_blocking` instead.
pub struct S3Store {
    client: Client,
    bucket: String,
    runtime: Runtime,
    etags: Mutex<HashMap<String, String>>,
}

impl core::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Creates a store over an already configured client.
    ///
    /// The bucket name is lowercased, as S3 requires.
    ///
    /// # Errors
    /// Returns [`S3StoreError::Runtime`] if the runtime cannot be built.
    pub fn new(client: Client, bucket: impl Into<String>) -> Result<Self, S3StoreError> {
        Ok(Self::with_runtime(client, bucket.into(), runtime()?))
    }

    /// Creates a store using the default AWS configuration chain
    /// (environment, profile, instance metadata).
    ///
    /// # Errors
    /// Returns [`S3StoreError::Runtime`] if the runtime cannot be built.
    pub fn from_env(bucket: impl Into<String>) -> Result<Self, S3StoreError> {
        let runtime = runtime()?;
        let config = runtime.block_on(aws_config::defaults(BehaviorVersion::latest()).load());
        Ok(Self::with_runtime(Client::new(&config), bucket.into(), runtime))
    }

    /// Creates a store against a custom endpoint (MinIO, LocalStack, ...).
    ///
    /// # Errors
    /// Returns [`S3StoreError::Runtime`] if the runtime cannot be built.
    pub fn with_endpoint(
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, S3StoreError> {
        let runtime = runtime()?;
        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.into()))
                .load(),
        );
        let s3_config = S3ConfigBuilder::from(&config)
            .endpoint_url(endpoint.into())
            .force_path_style(true)
            .build();
        Ok(Self::with_runtime(
            Client::from_conf(s3_config),
            bucket.into(),
            runtime,
        ))
    }

    fn with_runtime(client: Client, bucket: String, runtime: Runtime) -> Self {
        Self {
            client,
            bucket: bucket.to_lowercase(),
            runtime,
            etags: Mutex::default(),
        }
    }

    /// The bucket holding the counter objects.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Creates the bucket if it does not exist yet.
    ///
    /// # Errors
    /// Returns [`S3StoreError::Service`] if the bucket can neither be found nor
    /// created.
    pub fn init(&self) -> Result<(), S3StoreError> {
        self.runtime.block_on(async {
            if self
                .client
                .head_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .is_ok()
            {
                return Ok(());
            }

            match self.client.create_bucket().bucket(&self.bucket).send().await {
                Ok(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(bucket = %self.bucket, "created bucket");
                    Ok(())
                }
                Err(e)
                    if e.as_service_error().is_some_and(|e| {
                        e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                    }) =>
                {
                    Ok(())
                }
                Err(e) => Err(S3StoreError::Service(aws_sdk_s3::Error::from(e))),
            }
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<(String, Option<String>)>, S3StoreError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => {
                let etag = out.e_tag().map(str::to_owned);
                let bytes = out.body.collect().await?.into_bytes();
                // Non-UTF-8 content surfaces later as a corrupt value.
                Ok(Some((String::from_utf8_lossy(&bytes).into_owned(), etag)))
            }
            Err(e) if e.as_service_error().is_some_and(|e| e.is_no_such_key()) => Ok(None),
            Err(e) => Err(S3StoreError::Service(aws_sdk_s3::Error::from(e))),
        }
    }

    async fn seed(&self, key: &str) -> Result<(), S3StoreError> {
        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(CONTENT_TYPE)
            .if_none_match("*")
            .body(ByteStream::from_static(SEED_VALUE.as_bytes()))
            .send()
            .await;
        match res {
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(bucket = %self.bucket, key, "seeded counter");
                Ok(())
            }
            // Another participant seeded first.
            Err(e) if is_precondition_failure(&e) => Ok(()),
            Err(e) => Err(S3StoreError::Service(aws_sdk_s3::Error::from(e))),
        }
    }
}

impl OptimisticStore for S3Store {
    type Err = S3StoreError;

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn read(&self, scope: &str) -> Result<String, Self::Err> {
        let (value, etag) = self.runtime.block_on(async {
            if let Some(found) = self.fetch(scope).await? {
                return Ok::<_, S3StoreError>(found);
            }
            self.seed(scope).await?;
            self.fetch(scope).await?.ok_or_else(|| S3StoreError::Missing {
                key: scope.to_owned(),
            })
        })?;

        let mut etags = relock(&self.etags);
        match etag {
            Some(etag) => etags.insert(scope.to_owned(), etag),
            None => etags.remove(scope),
        };
        Ok(value)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn try_write(&self, scope: &str, value: &str) -> Result<bool, Self::Err> {
        let Some(etag) = relock(&self.etags).get(scope).cloned() else {
            return Ok(false);
        };

        let res = self.runtime.block_on(
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(scope)
                .content_type(CONTENT_TYPE)
                .if_match(etag)
                .body(ByteStream::from(value.as_bytes().to_vec()))
                .send(),
        );

        match res {
            Ok(out) => {
                let mut etags = relock(&self.etags);
                match out.e_tag() {
                    Some(etag) => etags.insert(scope.to_owned(), etag.to_owned()),
                    None => etags.remove(scope),
                };
                Ok(true)
            }
            Err(e) if is_precondition_failure(&e) => Ok(false),
            Err(e) => Err(S3StoreError::Service(aws_sdk_s3::Error::from(e))),
        }
    }
}

fn runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("rangeid-s3")
        .enable_all()
        .build()
}

/// `412 Precondition Failed`, or `409 Conflict` when S3 is resolving a
/// concurrent conditional write to the same key.
fn is_precondition_failure<E>(err: &SdkError<E, HttpResponse>) -> bool {
    err.raw_response()
        .is_some_and(|r| matches!(r.status().as_u16(), 409 | 412))
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::SdkBody;

    use super::*;

    fn rejected(status: u16) -> SdkError<(), HttpResponse> {
        let response = HttpResponse::new(status.try_into().unwrap(), SdkBody::empty());
        SdkError::service_error((), response)
    }

    #[test]
    fn conditional_failures_are_conflicts() {
        // 412 from a stale If-Match or a losing If-None-Match seed, 409 while
        // S3 settles a concurrent conditional write.
        assert!(is_precondition_failure(&rejected(412)));
        assert!(is_precondition_failure(&rejected(409)));
    }

    #[test]
    fn other_failures_are_not_conflicts() {
        for status in [400, 403, 404, 500, 503] {
            assert!(!is_precondition_failure(&rejected(status)), "{status}");
        }
        let timeout = SdkError::<(), HttpResponse>::timeout_error(std::io::Error::other("slow"));
        assert!(!is_precondition_failure(&timeout));
    }
}
