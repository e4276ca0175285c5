use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use super::{MediaObject, MediaReader, MediaStore, ObjectMeta, StorageError, content_type_for};

// Minimum part size for S3 is 5MB. We use 6MB to be safe.
const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO), bucket '{}'", bucket);

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    async fn create_multipart_upload(&self, key: &str, content_type: &str) -> Result<String, StorageError> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to initiate upload: {}", e)))?;

        result
            .upload_id
            .ok_or_else(|| StorageError::UploadFailed("S3 returned no upload id".to_string()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart, StorageError> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to upload part {}: {}", part_number, e)))?;

        let e_tag = result
            .e_tag
            .ok_or_else(|| StorageError::UploadFailed(format!("Part {} has no ETag", part_number)))?;

        Ok(CompletedPart::builder()
            .e_tag(e_tag)
            .part_number(part_number)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StorageError> {
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to complete upload: {}", e)))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to abort upload: {}", e)))?;

        Ok(())
    }
}

/// Buffers a file into parts of at least `MIN_PART_SIZE` and ships them
/// as one multipart upload. The last part may be smaller.
struct MultipartUploader<'a> {
    storage: &'a StorageService,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
}

impl<'a> MultipartUploader<'a> {
    async fn new(storage: &'a StorageService, key: &str, content_type: &str) -> Result<Self, StorageError> {
        let upload_id = storage.create_multipart_upload(key, content_type).await?;

        Ok(Self {
            storage,
            key: key.to_string(),
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
        })
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }

        Ok(())
    }

    async fn flush_part(&mut self) -> Result<(), StorageError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let body = Bytes::from(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(MIN_PART_SIZE),
        ));

        let part = self
            .storage
            .upload_part(&self.key, &self.upload_id, self.part_number, body)
            .await?;

        self.parts.push(part);
        self.part_number += 1;

        Ok(())
    }

    async fn finish(&mut self) -> Result<(), StorageError> {
        // S3 rejects a multipart upload without parts, so an empty file still sends one.
        if !self.buffer.is_empty() || self.parts.is_empty() {
            let body = Bytes::from(std::mem::take(&mut self.buffer));
            let part = self
                .storage
                .upload_part(&self.key, &self.upload_id, self.part_number, body)
                .await?;
            self.parts.push(part);
        }

        self.storage
            .complete_multipart_upload(&self.key, &self.upload_id, std::mem::take(&mut self.parts))
            .await
    }

    /// Best effort; the caller reports the error that caused the abort.
    async fn abort(&self) {
        if let Err(e) = self.storage.abort_multipart_upload(&self.key, &self.upload_id).await {
            warn!(key = %self.key, "Failed to abort multipart upload: {}", e);
        }
    }
}

#[async_trait]
impl MediaStore for StorageService {
    async fn put(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let mut file = tokio::fs::File::open(local_path).await?;
        let content_type = content_type_for(key);
        let mut uploader = MultipartUploader::new(self, key, &content_type).await?;
        let mut chunk = vec![0u8; 1024 * 1024];

        loop {
            let read = match file.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    error!("Read error while uploading {}: {}", local_path.display(), e);
                    uploader.abort().await;
                    return Err(StorageError::Io(e));
                }
            };

            if let Err(e) = uploader.write_chunk(&chunk[..read]).await {
                error!("Upload error for {}: {}", key, e);
                uploader.abort().await;
                return Err(e);
            }
        }

        if let Err(e) = uploader.finish().await {
            error!("Upload error for {}: {}", key, e);
            uploader.abort().await;
            return Err(e);
        }

        info!(key = %key, bucket = %self.bucket, "Object uploaded");
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<MediaObject, StorageError> {
        let resp = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(r) => r,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                return Err(StorageError::Backend(service_error.to_string()));
            }
        };

        let length = resp
            .content_length()
            .and_then(|l| u64::try_from(l).ok())
            .unwrap_or_default();
        let content_type = resp.content_type().map(str::to_string);
        let reader = resp.body.into_async_read();

        Ok(MediaObject {
            reader: Box::pin(reader),
            length,
            content_type,
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        let resp = match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(r) => r,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                return Err(StorageError::Backend(service_error.to_string()));
            }
        };

        Ok(ObjectMeta {
            length: resp
                .content_length()
                .and_then(|l| u64::try_from(l).ok())
                .unwrap_or_default(),
            content_type: resp.content_type().map(str::to_string),
        })
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<MediaReader, StorageError> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={}-{}", start, end))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                return Err(StorageError::Backend(service_error.to_string()));
            }
        };

        Ok(Box::pin(resp.body.into_async_read()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to delete {}: {}", key, e)))?;

        info!(key = %key, "Object deleted");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Backend(service_error.to_string()))
                }
            }
        }
    }
}
