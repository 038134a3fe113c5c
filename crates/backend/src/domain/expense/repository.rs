use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::shared::config::{config, Config};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Ошибки удалённого табличного хранилища
#[derive(Debug, Error)]
pub enum SheetError {
    /// Строка уже удалена (или ссылка указывает мимо данных)
    #[error("row {0} no longer exists in the sheet")]
    StaleHandle(u32),

    #[error("Google Sheets API error: {0}")]
    Api(String),

    #[error("Google Sheets authorization failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Порт к удалённому табличному хранилищу.
///
/// Каждая операция — один удалённый вызов; номера строк и колонок
/// 1-based, как в A1-нотации.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Дописать строку, вернуть номер строки, назначенный хранилищем
    async fn append_row(&self, cells: &[String]) -> Result<u32, SheetError>;

    /// Обновить одну ячейку
    async fn update_cell(&self, row: u32, col: u32, value: &str) -> Result<(), SheetError>;

    /// Удалить строку целиком
    async fn delete_row(&self, row: u32) -> Result<(), SheetError>;

    /// Все значения листа, включая шапку
    async fn all_values(&self) -> Result<Vec<Vec<String>>, SheetError>;

    /// Номер последней строки с данными
    async fn row_count(&self) -> Result<u32, SheetError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
}

#[derive(Debug, Serialize)]
struct TokenClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Google Sheets v4 REST-клиент с сервисным аккаунтом.
///
/// OAuth-токен и числовой id листа резолвятся лениво и кешируются.
pub struct GoogleSheetsStore {
    client: reqwest::Client,
    spreadsheet_id: String,
    worksheet: String,
    service_account_file: String,
    token: Mutex<Option<CachedToken>>,
    sheet_id: Mutex<Option<i64>>,
}

static STORE: Lazy<GoogleSheetsStore> = Lazy::new(|| GoogleSheetsStore::from_config(config()));

pub fn store() -> &'static GoogleSheetsStore {
    &STORE
}

impl GoogleSheetsStore {
    pub fn from_config(cfg: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.sheets.timeout_secs))
            .build()
            .expect("failed to build HTTP client for Google Sheets");

        Self {
            client,
            spreadsheet_id: cfg.secrets.spreadsheet_id.clone(),
            worksheet: cfg.sheets.worksheet.clone(),
            service_account_file: cfg.secrets.service_account_file.clone(),
            token: Mutex::new(None),
            sheet_id: Mutex::new(None),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_API_BASE,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    /// Действующий access token, с обменом сервисного JWT при истечении
    async fn access_token(&self) -> Result<String, SheetError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Utc::now() + chrono::Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
        }

        let contents = std::fs::read_to_string(&self.service_account_file).map_err(|e| {
            SheetError::Auth(format!(
                "cannot read service account file '{}': {}",
                self.service_account_file, e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&contents)
            .map_err(|e| SheetError::Auth(format!("malformed service account file: {}", e)))?;

        let now = Utc::now();
        let claims = TokenClaims {
            iss: key.client_email.clone(),
            scope: SHEETS_SCOPE.into(),
            aud: TOKEN_URL.into(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
        };
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SheetError::Auth(format!("invalid service account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| SheetError::Auth(format!("failed to sign token request: {}", e)))?;

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetError::Auth(e.to_string()))?;

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        };
        *guard = Some(cached);
        Ok(token.access_token)
    }

    /// Числовой id листа по его названию (нужен для deleteDimension)
    async fn resolve_sheet_id(&self) -> Result<i64, SheetError> {
        let mut guard = self.sheet_id.lock().await;
        if let Some(id) = *guard {
            return Ok(id);
        }

        let token = self.access_token().await?;
        let url = format!(
            "{}/{}?fields=sheets.properties",
            SHEETS_API_BASE, self.spreadsheet_id
        );
        let payload: serde_json::Value = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SheetError::Api(e.to_string()))?
            .json()
            .await?;

        let sheets = payload["sheets"].as_array().cloned().unwrap_or_default();
        for sheet in sheets {
            let props = &sheet["properties"];
            if props["title"].as_str() == Some(self.worksheet.as_str()) {
                if let Some(id) = props["sheetId"].as_i64() {
                    *guard = Some(id);
                    return Ok(id);
                }
            }
        }
        Err(SheetError::Api(format!(
            "worksheet '{}' not found in spreadsheet",
            self.worksheet
        )))
    }

    async fn values_get(&self, range: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(&token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetError::Api(format!(
                "values.get returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }
        let payload: serde_json::Value = response.json().await?;
        let rows = payload["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| c.as_str().unwrap_or_default().to_string())
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}

#[async_trait]
impl RowStore for GoogleSheetsStore {
    async fn append_row(&self, cells: &[String]) -> Result<u32, SheetError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.values_url(&self.worksheet)
        );
        let body = serde_json::json!({ "values": [cells] });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetError::Api(format!(
                "values.append returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        let updated_range = payload["updates"]["updatedRange"].as_str().unwrap_or("");
        parse_row_from_range(updated_range).ok_or_else(|| {
            SheetError::Api(format!(
                "append response has no parsable updatedRange: '{}'",
                updated_range
            ))
        })
    }

    async fn update_cell(&self, row: u32, col: u32, value: &str) -> Result<(), SheetError> {
        let token = self.access_token().await?;
        let range = format!("{}!{}{}", self.worksheet, column_letter(col), row);
        let url = format!(
            "{}?valueInputOption=USER_ENTERED",
            self.values_url(&range)
        );
        let body = serde_json::json!({ "values": [[value]] });

        let response = self
            .client
            .put(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetError::Api(format!(
                "values.update returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }
        Ok(())
    }

    async fn delete_row(&self, row: u32) -> Result<(), SheetError> {
        if row == 0 {
            return Err(SheetError::StaleHandle(0));
        }
        let token = self.access_token().await?;
        let sheet_id = self.resolve_sheet_id().await?;
        let url = format!("{}/{}:batchUpdate", SHEETS_API_BASE, self.spreadsheet_id);
        let body = serde_json::json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        // API считает строки с нуля, конец не включается
                        "startIndex": row - 1,
                        "endIndex": row,
                    },
                },
            }],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetError::Api(format!(
                "batchUpdate returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }
        Ok(())
    }

    async fn all_values(&self) -> Result<Vec<Vec<String>>, SheetError> {
        self.values_get(&self.worksheet).await
    }

    async fn row_count(&self) -> Result<u32, SheetError> {
        let column_a = format!("{}!A:A", self.worksheet);
        let rows = self.values_get(&column_a).await?;
        Ok(rows.len() as u32)
    }
}

/// A1-буква колонки по 1-based номеру
pub fn column_letter(col: u32) -> String {
    let mut col = col;
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Номер строки из updatedRange ответа append,
/// например "'Разходи 2026'!A42:J42" → 42
pub fn parse_row_from_range(range: &str) -> Option<u32> {
    let cell_part = range.rsplit('!').next()?;
    let first_cell = cell_part.split(':').next()?;
    let digits: String = first_cell.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(2), "B");
        assert_eq!(column_letter(10), "J");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
    }

    #[test]
    fn test_parse_row_from_range() {
        assert_eq!(parse_row_from_range("Sheet1!A42:J42"), Some(42));
        assert_eq!(parse_row_from_range("'Разходи 2026'!A5:J5"), Some(5));
        assert_eq!(parse_row_from_range("Sheet1!B7"), Some(7));
        assert_eq!(parse_row_from_range("garbage"), None);
        assert_eq!(parse_row_from_range(""), None);
    }
}
