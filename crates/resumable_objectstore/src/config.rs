use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use http::Uri;
use serde::Deserialize;

use super::errors::Result;
use super::s3::logging::LoggingInterceptor;
use super::s3::S3;
use super::validate::validate_bucket_name;

/// Connection settings for an S3-compatible object store.
#[derive(Clone, Deserialize)]
pub struct S3Config {
    /// `host[:port]` of the store, without scheme.
    pub endpoint: String,
    /// Selects `https` over `http`.
    #[serde(default)]
    pub secure: bool,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    /// Signing region, also known as the bucket location.
    #[serde(default = "default_region")]
    pub region: String,
    /// Address buckets as `endpoint/bucket/key`, which MinIO requires.
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_region() -> String {
    String::from("us-east-1")
}

fn default_timeout_secs() -> u64 {
    30
}

impl S3Config {
    pub async fn new_objects(&self) -> Result<S3> {
        let sdk_config = aws_config::load_from_env().await;
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .build();

        let builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .timeout_config(timeouts)
            .interceptor(LoggingInterceptor);
        let config = self.configure(builder).await?.build();

        tracing::info!(
            endpoint = %self.endpoint,
            bucket = %self.bucket_name,
            region = %self.region,
            "connected object store client"
        );
        Ok(S3::new(
            aws_sdk_s3::Client::from_conf(config),
            self.bucket_name.clone(),
        ))
    }

    /// Apply everything that comes from this config rather than the environment.
    pub(crate) async fn configure(
        &self,
        builder: aws_sdk_s3::config::Builder,
    ) -> Result<aws_sdk_s3::config::Builder> {
        validate_bucket_name(&self.bucket_name)?;

        let scp = SharedCredentialsProvider::new(
            Credentials::new(
                self.access_key.clone(),
                self.secret_key.clone(),
                None,
                None,
                "resumable",
            )
            .provide_credentials()
            .await?,
        );

        let uri = Uri::builder()
            .scheme(if self.secure { "https" } else { "http" })
            .authority(self.endpoint.as_str())
            .path_and_query("/")
            .build()?;

        Ok(builder
            .region(Region::new(self.region.clone()))
            .credentials_provider(scp)
            .endpoint_url(uri.to_string())
            .force_path_style(self.force_path_style))
    }
}
