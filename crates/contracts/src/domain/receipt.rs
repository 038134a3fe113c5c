use serde::{Deserialize, Serialize};

/// Курс лев/евро, зафиксированный валютным бордом.
pub const BGN_PER_EUR: f64 = 1.95583;

/// Результат сверки суммы чека с фискальным QR-кодом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// QR-код не найден или не распознан — сверка не проводилась
    Unchecked,
    /// Сумма из QR совпала с распознанной (расхождение < 0.02)
    Verified,
    /// Сумма из QR расходится с распознанной на 0.02 и более
    Mismatch,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Unchecked => "unchecked",
            ValidationStatus::Verified => "verified",
            ValidationStatus::Mismatch => "mismatch",
        }
    }
}

/// Ссылка на строку таблицы, возвращается операцией append.
///
/// Номер строки назначает само хранилище, клиент его не предсказывает.
/// После удаления строки ссылка становится недействительной.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowHandle(u32);

impl RowHandle {
    pub fn new(row: u32) -> Self {
        Self(row)
    }

    pub fn row(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for RowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Каноническая запись расхода.
///
/// `total_bgn` всегда производная величина (`total_eur` × курс),
/// отдельно не редактируется.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Дата с чека в формате DD.MM.YYYY
    pub date: String,
    pub total_eur: f64,
    pub total_bgn: f64,
    pub category: String,
    pub payment_method: Option<String>,
    pub notes: String,
    /// БУЛСТАТ/ЕИК продавца, если виден на чеке
    pub bulstat: Option<String>,
    pub validation_status: ValidationStatus,
}

/// Расшифрованный фискальный QR-код с чека.
///
/// Используется только для сверки: сумма из QR никогда не замещает
/// распознанную сумму.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalQrPayload {
    /// Номер фискального устройства
    pub fp_number: String,
    /// Номер чека
    pub receipt_number: String,
    pub date: String,
    pub time: Option<String>,
    pub amount: Option<f64>,
}
