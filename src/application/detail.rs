use crate::domain::{DomainError, RequestContext, UploadedImage};

use super::service::{parse_id, PhotoService};

impl PhotoService {
    /// Stored photo with a fresh analysis of its url overlaid. The stored row
    /// is left as it was; `req.url` is ignored.
    pub async fn get_detail(
        &self,
        ctx: &RequestContext,
        req: UploadedImage,
    ) -> Result<UploadedImage, DomainError> {
        let id = parse_id(&req.id)?;
        let mut record = self.store(ctx, move |repo| repo.get_by_id(id)).await?;

        record.face = Some(self.analyze_first_face(ctx, &record.url).await?);
        Ok(record.into())
    }
}
