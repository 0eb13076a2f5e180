use crate::domain::{DomainError, NewPhoto, PhotoRecord, RequestContext, UploadedImage};
use tracing::{info, warn};

use super::service::{validate_url, PhotoService};

impl PhotoService {
    /// Analyze, persist, then announce a new photo. The store insert is the
    /// commit point: nothing is written when analysis fails, and a failed
    /// publish after the insert does not fail the upload.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        req: UploadedImage,
    ) -> Result<UploadedImage, DomainError> {
        let url = validate_url(&req.url)?;

        // Extra faces are dropped; a photo stores one emotion/confidence pair.
        let face = self.analyze_first_face(ctx, &url).await?;

        let photo = NewPhoto {
            url,
            face: Some(face),
            upload_time: self.now(),
        };
        let row = photo.clone();
        let id = self.store(ctx, move |repo| repo.insert(&row)).await?;
        self.observe_id(id);
        info!("Photo {} uploaded from {}", id, photo.url);

        let message = format!("Photo Uploaded: {}", id);
        if let Err(e) = ctx.run(self.publisher.publish(&self.topic, &message)).await {
            warn!("Upload event for photo {} not published: {}", id, e);
        }

        Ok(PhotoRecord {
            id,
            url: photo.url,
            face: photo.face,
            upload_time: photo.upload_time,
        }
        .into())
    }
}
