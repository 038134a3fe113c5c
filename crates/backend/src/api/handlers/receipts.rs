use axum::extract::{Multipart, Path, Query};
use axum::Json;
use contracts::api::{
    AckResponse, ManualEntryRequest, ManualEntryResponse, UpdateEntryRequest, UploadResponse,
};
use contracts::domain::receipt::RowHandle;
use contracts::enums::vision_provider::VisionProviderKind;
use serde::Deserialize;

use crate::domain::expense::{repository, service};
use crate::shared::config::config;
use crate::shared::error::ApiError;
use crate::shared::{fiscal_qr, vision};

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub provider: Option<String>,
}

/// POST /api/upload?provider=<kind>
///
/// Фото чека → QR-сверка и распознавание на одних и тех же байтах →
/// строка в таблице. Ответ несёт ссылку на строку для правки/отмены.
pub async fn upload(
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let cfg = config();

    let provider_name = params
        .provider
        .unwrap_or_else(|| cfg.vision.default_provider.clone());
    if !cfg.is_enabled_provider(&provider_name) {
        return Err(ApiError::BadRequest(format!(
            "Unknown provider '{}'. Choose from: {}",
            provider_name,
            cfg.vision.providers.join(", ")
        )));
    }
    let provider = VisionProviderKind::from_str(&provider_name).map_err(ApiError::BadRequest)?;

    let (image, mime_type) = read_image_field(&mut multipart).await?;

    // QR декодируется локально, до сетевого вызова модели
    let qr = {
        let bytes = image.clone();
        tokio::task::spawn_blocking(move || fiscal_qr::decode_receipt_qr(&bytes))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("QR decode task failed: {}", e);
                None
            })
    };

    let mut extraction = vision::extract_receipt(provider, &image, &mime_type, cfg).await?;

    // БУЛСТАТ → категория из истории, только поверх категории-свалки
    if extraction.category == cfg.expense.default_category {
        if let Some(tax_id) = extraction.bulstat.clone() {
            match service::lookup_category_by_tax_id(repository::store(), &tax_id).await {
                Ok(Some(historical)) => {
                    tracing::info!(
                        "Auto-mapped БУЛСТАТ {} to category '{}' from history",
                        tax_id,
                        historical
                    );
                    extraction.category = historical;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to lookup category by БУЛСТАТ: {}", e),
            }
        }
    }

    let record = service::build_record(extraction, qr.as_ref().and_then(|q| q.amount));
    let row = service::append_expense(repository::store(), &record).await?;

    Ok(Json(UploadResponse {
        row,
        data: record,
        qr,
    }))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<(Vec<u8>, String), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let mime_type = field.content_type().unwrap_or_default().to_string();
        if !mime_type.starts_with("image/") {
            return Err(ApiError::BadRequest("File must be an image".into()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return Ok((bytes.to_vec(), mime_type));
    }
    Err(ApiError::BadRequest("Missing 'file' field".into()))
}

/// POST /api/manual
pub async fn manual(
    Json(req): Json<ManualEntryRequest>,
) -> Result<Json<ManualEntryResponse>, ApiError> {
    let record = service::manual_record(&req)?;
    let row = service::append_expense(repository::store(), &record).await?;
    Ok(Json(ManualEntryResponse { row, data: record }))
}

/// PATCH /api/entry/:row
pub async fn update_entry(
    Path(row): Path<u32>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    service::patch_field(
        repository::store(),
        RowHandle::new(row),
        &req.column,
        &req.value,
    )
    .await?;
    Ok(Json(AckResponse { ok: true }))
}

/// DELETE /api/entry/:row — отмена записи
pub async fn delete_entry(Path(row): Path<u32>) -> Result<Json<AckResponse>, ApiError> {
    service::delete_entry(repository::store(), RowHandle::new(row)).await?;
    Ok(Json(AckResponse { ok: true }))
}
