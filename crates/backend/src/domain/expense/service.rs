use chrono::{Local, NaiveDate};
use contracts::api::ManualEntryRequest;
use contracts::domain::receipt::{ReceiptRecord, RowHandle, ValidationStatus};
use thiserror::Error;

use super::repository::{RowStore, SheetError};
use super::{
    record_to_cells, CATEGORY_COLUMN, EDITABLE_COLUMNS, FIRST_DATA_ROW, PAYMENT_COLUMN,
    TAX_ID_COLUMN,
};
use crate::shared::config::config;
use crate::shared::currency;
use crate::shared::vision::NormalizedExtraction;

/// Порог сверки с QR: расхождение меньше двух стотинок считается
/// совпадением (поглощает разницу округления фискального устройства).
pub const QR_MATCH_TOLERANCE: f64 = 0.02;

/// Ошибки валидации пользовательского ввода
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Amount must be a positive number")]
    InvalidAmount,

    #[error("Invalid date '{0}', expected DD.MM.YYYY")]
    InvalidDate(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column '{0}' is not editable")]
    ColumnNotEditable(String),
}

/// Ошибка правки: либо ввод не прошёл валидацию, либо отказало хранилище
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

/// Собрать каноническую запись из распознавания, сверки с QR
/// и производной суммы в левах.
///
/// Сумма из QR только сравнивается и никогда не замещает распознанную.
pub fn build_record(extraction: NormalizedExtraction, cross_check: Option<f64>) -> ReceiptRecord {
    let validation_status = match cross_check {
        Some(qr) if (qr - extraction.total_eur).abs() < QR_MATCH_TOLERANCE => {
            ValidationStatus::Verified
        }
        Some(qr) => {
            tracing::warn!(
                "QR amount ({:.2}) differs from extracted amount ({:.2})",
                qr,
                extraction.total_eur
            );
            ValidationStatus::Mismatch
        }
        None => ValidationStatus::Unchecked,
    };

    ReceiptRecord {
        total_bgn: currency::derive_bgn(extraction.total_eur),
        date: extraction.date,
        total_eur: extraction.total_eur,
        category: extraction.category,
        payment_method: extraction.payment_method,
        notes: extraction.notes,
        bulstat: extraction.bulstat,
        validation_status,
    }
}

/// Запись из ручного ввода: без распознавания и QR, статус unchecked,
/// но те же закрытые наборы и производная валюта.
pub fn manual_record(req: &ManualEntryRequest) -> Result<ReceiptRecord, ValidationError> {
    let cfg = config();

    if !req.total_eur.is_finite() || req.total_eur <= 0.0 {
        return Err(ValidationError::InvalidAmount);
    }
    if !cfg.is_known_category(&req.category) {
        return Err(ValidationError::UnknownCategory(req.category.clone()));
    }

    let payment_method = match req.payment_method.as_deref() {
        Some(m) if !m.is_empty() => {
            if !cfg.is_known_payment_method(m) {
                return Err(ValidationError::UnknownPaymentMethod(m.to_string()));
            }
            Some(m.to_string())
        }
        _ => None,
    };

    let date = if req.date.trim().is_empty() {
        Local::now().format("%d.%m.%Y").to_string()
    } else {
        let date = req.date.trim();
        if NaiveDate::parse_from_str(date, "%d.%m.%Y").is_err() {
            return Err(ValidationError::InvalidDate(date.to_string()));
        }
        date.to_string()
    };

    Ok(ReceiptRecord {
        date,
        total_eur: req.total_eur,
        total_bgn: currency::derive_bgn(req.total_eur),
        category: req.category.clone(),
        payment_method,
        notes: req.notes.clone(),
        bulstat: None,
        validation_status: ValidationStatus::Unchecked,
    })
}

/// Дописать запись в хранилище, вернуть ссылку на созданную строку.
pub async fn append_expense(
    store: &impl RowStore,
    record: &ReceiptRecord,
) -> Result<RowHandle, SheetError> {
    let row = store.append_row(&record_to_cells(record)).await?;
    tracing::info!("Appended expense row {}", row);
    Ok(RowHandle::new(row))
}

/// Правка одной ячейки по имени колонки.
///
/// Повторный вызов с тем же значением — наблюдаемый no-op.
pub async fn patch_field(
    store: &impl RowStore,
    handle: RowHandle,
    column: &str,
    value: &str,
) -> Result<(), PatchError> {
    let cfg = config();

    let col = cfg
        .column_index(column)
        .ok_or_else(|| ValidationError::UnknownColumn(column.to_string()))?;
    if !EDITABLE_COLUMNS.contains(&column) {
        return Err(ValidationError::ColumnNotEditable(column.to_string()).into());
    }
    if column == CATEGORY_COLUMN && !cfg.is_known_category(value) {
        return Err(ValidationError::UnknownCategory(value.to_string()).into());
    }
    if column == PAYMENT_COLUMN && !value.is_empty() && !cfg.is_known_payment_method(value) {
        return Err(ValidationError::UnknownPaymentMethod(value.to_string()).into());
    }

    ensure_live(store, handle).await?;
    store.update_cell(handle.row(), col, value).await?;
    Ok(())
}

/// Удалить строку (undo). После удаления ссылка недействительна.
pub async fn delete_entry(store: &impl RowStore, handle: RowHandle) -> Result<(), SheetError> {
    ensure_live(store, handle).await?;
    store.delete_row(handle.row()).await?;
    tracing::info!("Deleted expense row {}", handle.row());
    Ok(())
}

/// Ссылка жива, пока указывает в пределы данных листа.
async fn ensure_live(store: &impl RowStore, handle: RowHandle) -> Result<(), SheetError> {
    let row = handle.row();
    if row < FIRST_DATA_ROW {
        return Err(SheetError::StaleHandle(row));
    }
    if row > store.row_count().await? {
        return Err(SheetError::StaleHandle(row));
    }
    Ok(())
}

/// Исторический подбор категории по БУЛСТАТ: самая частая категория
/// этого продавца в уже записанных строках.
pub async fn lookup_category_by_tax_id(
    store: &impl RowStore,
    tax_id: &str,
) -> Result<Option<String>, SheetError> {
    if tax_id.is_empty() {
        return Ok(None);
    }

    let values = store.all_values().await?;
    let Some(header) = values.first() else {
        return Ok(None);
    };
    let Some(tax_col) = header.iter().position(|c| c == TAX_ID_COLUMN) else {
        return Ok(None);
    };
    let Some(cat_col) = header.iter().position(|c| c == CATEGORY_COLUMN) else {
        return Ok(None);
    };

    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for row in values.iter().skip(1) {
        if row.get(tax_col).map(|v| v == tax_id).unwrap_or(false) {
            if let Some(category) = row.get(cat_col).filter(|c| !c.is_empty()) {
                *counts.entry(category.as_str()).or_default() += 1;
            }
        }
    }

    Ok(counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .map(|(category, _)| category.to_string()))
}
