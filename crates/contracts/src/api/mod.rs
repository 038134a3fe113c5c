use serde::{Deserialize, Serialize};

use crate::domain::receipt::{FiscalQrPayload, ReceiptRecord, RowHandle};

/// Ответ POST /api/upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub row: RowHandle,
    pub data: ReceiptRecord,
    pub qr: Option<FiscalQrPayload>,
}

/// Запрос POST /api/manual
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntryRequest {
    /// DD.MM.YYYY; пустая строка — сегодняшняя дата
    #[serde(default)]
    pub date: String,
    pub total_eur: f64,
    pub category: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: String,
}

/// Ответ POST /api/manual
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntryResponse {
    pub row: RowHandle,
    pub data: ReceiptRecord,
}

/// Запрос PATCH /api/entry/:row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    /// Имя колонки из редактируемого набора
    pub column: String,
    pub value: String,
}

/// Ответ операций patch/delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// Ответ GET /api/config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub version: String,
    pub categories: Vec<String>,
    pub payment_methods: Vec<String>,
    pub providers: Vec<String>,
    pub default_provider: String,
}
