use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::mlclient::services::{FileStore, StoreError};

#[derive(Clone)]
pub struct S3FileStore {
    client: Client,
    bucket_name: String,
}

impl S3FileStore {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let result = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(path)
            .send()
            .await
        {
            Ok(result) => result,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Err(StoreError::NotFound(format!(
                        "s3://{}/{}",
                        self.bucket_name, path
                    )));
                }
                log::error!("S3 get_object failed for {}: {:?}", path, e);
                return Err(StoreError::Backend(e.to_string()));
            }
        };

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn save(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let body = ByteStream::from(content.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(path)
            .body(body)
            .content_type("text/csv")
            .send()
            .await
            .map_err(|e| {
                log::error!("S3 put_object failed for {}: {:?}", path, e);
                StoreError::Backend(e.to_string())
            })?;

        Ok(())
    }
}
