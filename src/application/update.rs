use crate::domain::{DomainError, RequestContext, UploadedImage};
use tracing::info;

use super::service::{parse_id, validate_url, PhotoService};

impl PhotoService {
    /// Points an existing photo at a new url and re-analyzes it. No upload
    /// event is published.
    pub async fn update_detail(
        &self,
        ctx: &RequestContext,
        req: UploadedImage,
    ) -> Result<UploadedImage, DomainError> {
        let id = parse_id(&req.id)?;
        let url = validate_url(&req.url)?;

        let mut record = self.store(ctx, move |repo| repo.get_by_id(id)).await?;
        let face = self.analyze_first_face(ctx, &url).await?;

        record.url = url;
        record.face = Some(face);
        record.upload_time = self.now();

        let row = record.clone();
        self.store(ctx, move |repo| repo.update(&row)).await?;
        info!("Photo {} updated to {}", record.id, record.url);

        Ok(record.into())
    }
}
