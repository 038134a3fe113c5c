use contracts::domain::receipt::FiscalQrPayload;

/// Поиск и расшифровка фискального QR-кода на снимке чека.
///
/// Строго best-effort: отсутствие кода, нечитаемый код или незнакомый
/// формат полезной нагрузки дают `None` и никогда не прерывают обработку.
pub fn decode_receipt_qr(image_bytes: &[u8]) -> Option<FiscalQrPayload> {
    let image = match image::load_from_memory(image_bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("Failed to decode image for QR scan: {}", e);
            return None;
        }
    };

    let mut prepared = rqrr::PreparedImage::prepare(image.to_luma8());
    for grid in prepared.detect_grids() {
        let text = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                tracing::warn!("Failed to decode QR grid: {}", e);
                continue;
            }
        };
        if let Some(payload) = parse_fiscal_payload(&text) {
            return Some(payload);
        }
        tracing::warn!("QR payload not recognized as fiscal: '{}'", text);
    }

    None
}

/// Разбор болгарской фискальной нагрузки: поля через `*`,
/// номер устройства, номер чека, дата, время, сумма.
pub fn parse_fiscal_payload(text: &str) -> Option<FiscalQrPayload> {
    let parts: Vec<&str> = text.split('*').collect();
    if parts.len() < 4 {
        return None;
    }

    let amount = match parts.get(4) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) => Some(v),
            // сумма есть, но не число — нагрузка не фискальная
            Err(_) => return None,
        },
        None => None,
    };

    Some(FiscalQrPayload {
        fp_number: parts[0].to_string(),
        receipt_number: parts[1].to_string(),
        date: parts[2].to_string(),
        time: parts.get(3).map(|s| s.to_string()),
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_payload() {
        let payload = parse_fiscal_payload("DT123456*0001234*2026-01-03*14:25:00*45.50").unwrap();
        assert_eq!(payload.fp_number, "DT123456");
        assert_eq!(payload.receipt_number, "0001234");
        assert_eq!(payload.date, "2026-01-03");
        assert_eq!(payload.time.as_deref(), Some("14:25:00"));
        assert_eq!(payload.amount, Some(45.50));
    }

    #[test]
    fn test_payload_without_amount() {
        let payload = parse_fiscal_payload("DT123456*0001234*2026-01-03*14:25:00").unwrap();
        assert_eq!(payload.amount, None);
    }

    #[test]
    fn test_too_few_fields_rejected() {
        assert!(parse_fiscal_payload("DT123456*0001234*2026-01-03").is_none());
        assert!(parse_fiscal_payload("https://example.com/receipt").is_none());
        assert!(parse_fiscal_payload("").is_none());
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        assert!(parse_fiscal_payload("DT1*1*2026-01-03*14:25:00*abc").is_none());
    }

    #[test]
    fn test_no_qr_in_garbage_bytes() {
        assert!(decode_receipt_qr(b"definitely not an image").is_none());
    }
}
