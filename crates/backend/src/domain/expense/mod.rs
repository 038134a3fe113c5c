pub mod repository;
pub mod service;

use contracts::domain::receipt::ReceiptRecord;

pub const CATEGORY_COLUMN: &str = "Категория";
pub const PAYMENT_COLUMN: &str = "Плащане";
pub const NOTES_COLUMN: &str = "Пояснения";
pub const TAX_ID_COLUMN: &str = "БУЛСТАТ";

/// Колонки, которые можно править после записи.
/// Денежные колонки меняются только через новый append.
pub const EDITABLE_COLUMNS: &[&str] = &[CATEGORY_COLUMN, PAYMENT_COLUMN, NOTES_COLUMN];

/// Первая строка с данными; строка 1 — шапка листа.
pub const FIRST_DATA_ROW: u32 = 2;

/// Денежная ячейка с десятичной запятой.
fn money_cell(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}

/// Запись → ячейки строки листа в фиксированном порядке колонок.
///
/// GGBG лв, Допълн. такса и Payback заполняются вручную позже
/// и пишутся пустыми.
pub fn record_to_cells(record: &ReceiptRecord) -> Vec<String> {
    vec![
        record.date.clone(),
        record.category.clone(),
        money_cell(record.total_bgn),
        money_cell(record.total_eur),
        String::new(), // GGBG лв
        record.payment_method.clone().unwrap_or_default(),
        String::new(), // Допълн. такса
        String::new(), // Payback
        record.notes.clone(),
        record.bulstat.clone().unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::test_config;
    use contracts::domain::receipt::ValidationStatus;

    fn sample_record() -> ReceiptRecord {
        ReceiptRecord {
            date: "15.02.2026".into(),
            total_eur: 23.45,
            total_bgn: 45.86,
            category: "Храна".into(),
            payment_method: Some("Revolut".into()),
            notes: "хляб, мляко, сирене".into(),
            bulstat: Some("123456789".into()),
            validation_status: ValidationStatus::Unchecked,
        }
    }

    #[test]
    fn test_cells_match_column_layout() {
        let cells = record_to_cells(&sample_record());
        assert_eq!(cells.len(), test_config().sheets.columns.len());
        assert_eq!(cells[0], "15.02.2026");
        assert_eq!(cells[1], "Храна");
        assert_eq!(cells[2], "45,86"); // Цена лв
        assert_eq!(cells[3], "23,45"); // Цена €
        assert_eq!(cells[4], ""); // GGBG лв — заполняется вручную
        assert_eq!(cells[5], "Revolut");
        assert_eq!(cells[6], "");
        assert_eq!(cells[7], "");
        assert_eq!(cells[8], "хляб, мляко, сирене");
        assert_eq!(cells[9], "123456789");
    }

    #[test]
    fn test_cells_without_optional_fields() {
        let mut record = sample_record();
        record.payment_method = None;
        record.bulstat = None;
        let cells = record_to_cells(&record);
        assert_eq!(cells[5], "");
        assert_eq!(cells[9], "");
    }

    #[test]
    fn test_editable_columns_exist_in_config() {
        let cfg = test_config();
        for column in EDITABLE_COLUMNS {
            assert!(cfg.column_index(column).is_some(), "missing {}", column);
        }
    }
}
