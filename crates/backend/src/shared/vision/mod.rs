pub mod anthropic;
pub mod gemini;
pub mod grok;

use async_trait::async_trait;
use chrono::NaiveDate;
use contracts::enums::vision_provider::VisionProviderKind;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::shared::config::Config;

/// Ошибки распознавания чека
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("vision backend error: {0}")]
    Backend(String),

    #[error("vision backend timed out")]
    Timeout,

    #[error("no valid JSON found in model response: {0}")]
    UnparsableResponse(String),

    #[error("receipt date is missing or not DD.MM.YYYY: '{0}'")]
    InvalidDate(String),

    #[error("receipt total is missing or not a positive amount: '{0}'")]
    InvalidTotal(String),

    #[error("provider {0} is not configured: {1}")]
    NotConfigured(&'static str, &'static str),
}

/// Нормализованный результат распознавания.
///
/// Каждый backend приводится к этому виду независимо от формы своего API.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedExtraction {
    pub date: String,
    pub total_eur: f64,
    pub category: String,
    pub payment_method: Option<String>,
    pub notes: String,
    pub bulstat: Option<String>,
}

/// Трейт vision-провайдера: фото чека → сырой текст ответа модели.
///
/// Ровно одна попытка, без повторов; таймаут и ошибки API
/// поднимаются как `ExtractionError`.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn extract_raw(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError>;

    fn provider_name(&self) -> &'static str;
}

/// Распознать чек выбранным провайдером и нормализовать ответ.
pub async fn extract_receipt(
    kind: VisionProviderKind,
    image: &[u8],
    mime_type: &str,
    cfg: &Config,
) -> Result<NormalizedExtraction, ExtractionError> {
    let prompt = build_prompt(cfg);

    let raw_text = match kind {
        VisionProviderKind::Claude => {
            anthropic::ClaudeVision::from_config(cfg)?
                .extract_raw(image, mime_type, &prompt)
                .await?
        }
        VisionProviderKind::Gemini => {
            gemini::GeminiVision::from_config(cfg)?
                .extract_raw(image, mime_type, &prompt)
                .await?
        }
        VisionProviderKind::Grok => {
            grok::GrokVision::from_config(cfg)?
                .extract_raw(image, mime_type, &prompt)
                .await?
        }
    };

    let value = extract_json(&raw_text)?;
    normalize_extraction(&value, cfg)
}

/// Промпт для модели: ответ строго JSON, категория и способ оплаты
/// только из закрытых наборов.
pub fn build_prompt(cfg: &Config) -> String {
    format!(
        r#"You are a receipt parser for Bulgarian household expenses.
Given a photo of a receipt, extract the following information and return ONLY valid JSON (no markdown, no code fences):

{{
  "date": "DD.MM.YYYY",
  "total_eur": 12.34,
  "category": "one of the allowed categories",
  "payment_method": "one of the allowed payment methods or null",
  "notes": "brief description of main items in Bulgarian, 3-5 words",
  "bulstat": "company БУЛСТАТ/ЕИК number or null"
}}

Allowed categories: {categories}

Allowed payment methods: {payment_methods}

Rules:
- Date format must be DD.MM.YYYY
- total_eur must be the final total as a number (EUR amount)
- category MUST be exactly one from the allowed list — pick the best match
- payment_method: pick from allowed list if visible on receipt, otherwise null
- notes: short Bulgarian summary of what was purchased
- bulstat: the seller's БУЛСТАТ or ЕИК number (usually 9-13 digits, often near the top of the receipt). Return null if not visible.
- If the receipt is unclear, make your best guess
"#,
        categories = cfg.expense.categories.join(", "),
        payment_methods = cfg.expense.payment_methods.join(", "),
    )
}

static JSON_IN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());
static JSON_ANYWHERE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Извлечь JSON-объект из текста ответа модели (code fences допустимы).
pub fn extract_json(text: &str) -> Result<serde_json::Value, ExtractionError> {
    if let Some(caps) = JSON_IN_FENCE.captures(text) {
        if let Ok(value) = serde_json::from_str(&caps[1]) {
            return Ok(value);
        }
    }
    if let Some(m) = JSON_ANYWHERE.find(text) {
        if let Ok(value) = serde_json::from_str(m.as_str()) {
            return Ok(value);
        }
    }
    let preview: String = text.chars().take(200).collect();
    Err(ExtractionError::UnparsableResponse(preview))
}

/// Сумма из текста: запятая и точка как десятичный разделитель,
/// символы валют и разрядные разделители отбрасываются.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let decimal_pos = match (last_dot, last_comma) {
        // оба разделителя: правый — десятичный
        (Some(d), Some(c)) => Some(d.max(c)),
        (Some(d), None) => single_separator_as_decimal(&cleaned, d),
        (None, Some(c)) => single_separator_as_decimal(&cleaned, c),
        (None, None) => None,
    };

    let mut normalized = String::with_capacity(cleaned.len());
    for (i, ch) in cleaned.char_indices() {
        match ch {
            '.' | ',' => {
                if Some(i) == decimal_pos {
                    normalized.push('.');
                }
            }
            _ => normalized.push(ch),
        }
    }
    normalized.parse::<f64>().ok()
}

/// Единственный вид разделителя: десятичный, если встречается один раз
/// и после него не больше двух цифр, иначе разрядный.
fn single_separator_as_decimal(s: &str, pos: usize) -> Option<usize> {
    let sep = s.as_bytes()[pos] as char;
    let digits_after = s.len() - pos - 1;
    if s.matches(sep).count() == 1 && digits_after <= 2 {
        Some(pos)
    } else {
        None
    }
}

/// Привести разобранный JSON к `NormalizedExtraction`.
///
/// Отсутствие даты или суммы фатально; категория вне закрытого набора
/// детерминированно сводится к категории-свалке, неизвестный способ
/// оплаты отбрасывается.
pub fn normalize_extraction(
    value: &serde_json::Value,
    cfg: &Config,
) -> Result<NormalizedExtraction, ExtractionError> {
    let date = value
        .get("date")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();
    if NaiveDate::parse_from_str(&date, "%d.%m.%Y").is_err() {
        return Err(ExtractionError::InvalidDate(date));
    }

    let total_eur = match value.get("total_eur") {
        Some(v) if v.is_number() => v.as_f64(),
        Some(v) => v.as_str().and_then(parse_amount),
        None => None,
    };
    let total_eur = match total_eur {
        Some(t) if t.is_finite() && t > 0.0 => t,
        _ => {
            let raw = value
                .get("total_eur")
                .map(|v| v.to_string())
                .unwrap_or_default();
            return Err(ExtractionError::InvalidTotal(raw));
        }
    };

    let category = value
        .get("category")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let category = if cfg.is_known_category(category) {
        category.to_string()
    } else {
        cfg.expense.default_category.clone()
    };

    let payment_method = value
        .get("payment_method")
        .and_then(|v| v.as_str())
        .filter(|m| cfg.is_known_payment_method(m))
        .map(|m| m.to_string());

    let notes = value
        .get("notes")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let bulstat = match value.get("bulstat") {
        Some(serde_json::Value::String(s)) => normalize_tax_id(s),
        Some(serde_json::Value::Number(n)) => normalize_tax_id(&n.to_string()),
        _ => None,
    };

    Ok(NormalizedExtraction {
        date,
        total_eur,
        category,
        payment_method,
        notes,
        bulstat,
    })
}

/// БУЛСТАТ: только цифры, пустой результат отбрасывается.
pub fn normalize_tax_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::test_config;

    fn sample_response() -> serde_json::Value {
        serde_json::json!({
            "date": "15.02.2026",
            "total_eur": 23.45,
            "category": "Храна",
            "payment_method": "Revolut",
            "notes": "хляб, мляко, сирене",
            "bulstat": "BG123456789",
        })
    }

    #[test]
    fn test_extract_json_plain() {
        let v = extract_json(r#"{"date": "15.02.2026", "total_eur": 10.5}"#).unwrap();
        assert_eq!(v["date"], "15.02.2026");
        assert_eq!(v["total_eur"], 10.5);
    }

    #[test]
    fn test_extract_json_in_code_fence() {
        let v = extract_json("```json\n{\"date\": \"15.02.2026\", \"total_eur\": 10.5}\n```")
            .unwrap();
        assert_eq!(v["date"], "15.02.2026");
    }

    #[test]
    fn test_extract_json_in_plain_fence() {
        let v = extract_json("```\n{\"date\": \"15.02.2026\"}\n```").unwrap();
        assert_eq!(v["date"], "15.02.2026");
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let v = extract_json("Here is the result:\n{\"total_eur\": 10.5}\nDone.").unwrap();
        assert_eq!(v["total_eur"], 10.5);
    }

    #[test]
    fn test_extract_json_none_found() {
        assert!(matches!(
            extract_json("This is not JSON at all"),
            Err(ExtractionError::UnparsableResponse(_))
        ));
    }

    #[test]
    fn test_parse_amount_separators() {
        assert_eq!(parse_amount("45.50"), Some(45.50));
        assert_eq!(parse_amount("45,50"), Some(45.50));
        assert_eq!(parse_amount("12,3"), Some(12.3));
        assert_eq!(parse_amount("1 234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
    }

    #[test]
    fn test_parse_amount_strips_currency() {
        assert_eq!(parse_amount("€12.34"), Some(12.34));
        assert_eq!(parse_amount("12.34 лв"), Some(12.34));
        assert_eq!(parse_amount("EUR 45,50"), Some(45.50));
    }

    #[test]
    fn test_parse_amount_thousands_only() {
        // три цифры после единственного разделителя — разрядный
        assert_eq!(parse_amount("1.234"), Some(1234.0));
        assert_eq!(parse_amount("1,234"), Some(1234.0));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
    }

    #[test]
    fn test_parse_amount_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("free"), None);
    }

    #[test]
    fn test_normalize_valid_data() {
        let cfg = test_config();
        let extraction = normalize_extraction(&sample_response(), &cfg).unwrap();
        assert_eq!(extraction.date, "15.02.2026");
        assert_eq!(extraction.total_eur, 23.45);
        assert_eq!(extraction.category, "Храна");
        assert_eq!(extraction.payment_method.as_deref(), Some("Revolut"));
        assert_eq!(extraction.notes, "хляб, мляко, сирене");
        assert_eq!(extraction.bulstat.as_deref(), Some("123456789"));
    }

    #[test]
    fn test_normalize_unknown_category_falls_back() {
        let cfg = test_config();
        let mut value = sample_response();
        value["category"] = "NonExistent".into();
        let extraction = normalize_extraction(&value, &cfg).unwrap();
        assert_eq!(extraction.category, cfg.expense.default_category);
    }

    #[test]
    fn test_normalize_unknown_payment_method_dropped() {
        let cfg = test_config();
        let mut value = sample_response();
        value["payment_method"] = "Bitcoin".into();
        let extraction = normalize_extraction(&value, &cfg).unwrap();
        assert_eq!(extraction.payment_method, None);
    }

    #[test]
    fn test_normalize_total_as_string_with_comma() {
        let cfg = test_config();
        let mut value = sample_response();
        value["total_eur"] = "23,45 €".into();
        let extraction = normalize_extraction(&value, &cfg).unwrap();
        assert_eq!(extraction.total_eur, 23.45);
    }

    #[test]
    fn test_normalize_missing_date_is_fatal() {
        let cfg = test_config();
        let mut value = sample_response();
        value.as_object_mut().unwrap().remove("date");
        assert!(matches!(
            normalize_extraction(&value, &cfg),
            Err(ExtractionError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_normalize_bad_date_format_is_fatal() {
        let cfg = test_config();
        let mut value = sample_response();
        value["date"] = "2026-02-15".into();
        assert!(matches!(
            normalize_extraction(&value, &cfg),
            Err(ExtractionError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_normalize_missing_or_zero_total_is_fatal() {
        let cfg = test_config();

        let mut value = sample_response();
        value.as_object_mut().unwrap().remove("total_eur");
        assert!(matches!(
            normalize_extraction(&value, &cfg),
            Err(ExtractionError::InvalidTotal(_))
        ));

        let mut value = sample_response();
        value["total_eur"] = 0.into();
        assert!(matches!(
            normalize_extraction(&value, &cfg),
            Err(ExtractionError::InvalidTotal(_))
        ));
    }

    #[test]
    fn test_normalize_all_configured_categories_accepted() {
        let cfg = test_config();
        for category in &cfg.expense.categories {
            let mut value = sample_response();
            value["category"] = category.as_str().into();
            let extraction = normalize_extraction(&value, &cfg).unwrap();
            assert_eq!(&extraction.category, category);
        }
    }

    #[test]
    fn test_prompt_lists_closed_sets() {
        let cfg = test_config();
        let prompt = build_prompt(&cfg);
        for category in &cfg.expense.categories {
            assert!(prompt.contains(category.as_str()));
        }
        for method in &cfg.expense.payment_methods {
            assert!(prompt.contains(method.as_str()));
        }
    }

    #[test]
    fn test_normalize_tax_id() {
        assert_eq!(normalize_tax_id("BG123456789").as_deref(), Some("123456789"));
        assert_eq!(normalize_tax_id("123 456 789").as_deref(), Some("123456789"));
        assert_eq!(normalize_tax_id("n/a"), None);
    }
}
