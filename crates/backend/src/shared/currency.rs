use contracts::domain::receipt::BGN_PER_EUR;

/// Производная сумма в левах по фиксированному курсу,
/// округление до стотинки.
pub fn derive_bgn(total_eur: f64) -> f64 {
    (total_eur * BGN_PER_EUR * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_bgn() {
        assert_eq!(derive_bgn(0.0), 0.0);
        assert_eq!(derive_bgn(1.0), 1.96);
        assert_eq!(derive_bgn(10.0), 19.56);
        assert_eq!(derive_bgn(23.45), 45.86);
        assert_eq!(derive_bgn(45.50), 88.99);
    }

    #[test]
    fn test_derive_bgn_rounds_half_up() {
        // 0.25 * 1.95583 = 0.4889575
        assert_eq!(derive_bgn(0.25), 0.49);
        // 100 * 1.95583 = 195.583
        assert_eq!(derive_bgn(100.0), 195.58);
    }
}
