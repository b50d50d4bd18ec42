use crate::error::{FecanboError, FecanboResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;
use uuid::Uuid;

/// Argentina does not observe DST; receipts and labels are shown in UTC-3.
pub fn argentina_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).expect("UTC-3 is a valid offset")
}

pub async fn ping() -> &'static str {
    "pong"
}

/// Form fields arrive as empty strings when left blank.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn require_text(value: Option<String>, message: &str) -> FecanboResult<String> {
    blank_to_none(value).ok_or_else(|| FecanboError::Validation(message.to_string()))
}

pub fn parse_uuid_field(value: Option<String>, message: &str) -> FecanboResult<Uuid> {
    blank_to_none(value)
        .and_then(|v| Uuid::parse_str(&v).ok())
        .ok_or_else(|| FecanboError::Validation(message.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Num(f64),
    Text(String),
}

/// Numeric form field: a JSON number, a numeric string, or an empty string
/// (read as absent).
pub fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<RawNumber>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawNumber::Num(n)) => n,
        Some(RawNumber::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(RawNumber::Text(s)) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("valor numérico inválido: '{}'", s)))?,
    };
    if !value.is_finite() {
        return Err(de::Error::custom("valor numérico inválido"));
    }
    Ok(Some(value))
}

/// Integer form field; decimals are truncated and values outside `i32` are
/// rejected.
pub fn de_opt_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match de_opt_f64(deserializer)? {
        None => Ok(None),
        Some(v) => {
            let value = v.trunc();
            if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
                return Err(de::Error::custom(format!("valor fuera de rango: {}", v)));
            }
            Ok(Some(value as i32))
        }
    }
}

/// Exact decimal form field. Text is parsed as written; JSON numbers go
/// through their shortest representation, so `2.675` stays `2.675`.
pub fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<RawNumber>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawNumber::Num(n)) => n.to_string(),
        Some(RawNumber::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(RawNumber::Text(s)) => s.trim().replace(',', "."),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| de::Error::custom(format!("valor numérico inválido: '{}'", text)))
}

pub fn parse_date_safe(date_str: &str) -> Option<NaiveDate> {
    if date_str.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_str.trim(), "%Y%m%d"))
        .ok()
}

/// Accepts RFC 3339, `datetime-local` input values (read as Argentina local
/// time) and plain dates (midnight, Argentina local time).
pub fn parse_datetime_flexible(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let local = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| parse_date_safe(value).and_then(|d| d.and_hms_opt(0, 0, 0)))?;
    argentina_offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `toLocaleDateString("es-AR")` style: 5/3/2025.
pub fn format_fecha_ar(date: NaiveDate) -> String {
    date.format("%-d/%-m/%Y").to_string()
}

/// `toLocaleString("es-AR")` style: 5/3/2025, 14:30:00.
pub fn format_fecha_hora_ar(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&argentina_offset())
        .format("%-d/%-m/%Y, %H:%M:%S")
        .to_string()
}

/// Collapses whitespace runs into dashes for download file names.
pub fn slug(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_blank_fields_become_none() {
        assert_eq!(blank_to_none(Some("  ".to_string())), None);
        assert_eq!(blank_to_none(None), None);
        assert_eq!(
            blank_to_none(Some(" Critical Kush ".to_string())),
            Some("Critical Kush".to_string())
        );
        assert!(require_text(Some(String::new()), "obligatorio").is_err());
    }

    #[test]
    fn test_date_parsing() {
        assert_eq!(
            parse_date_safe("2024-10-27"),
            NaiveDate::from_ymd_opt(2024, 10, 27)
        );
        assert_eq!(
            parse_date_safe("20241027"),
            NaiveDate::from_ymd_opt(2024, 10, 27)
        );
        assert_eq!(parse_date_safe("invalid"), None);
        assert_eq!(parse_date_safe(""), None);
    }

    #[test]
    fn test_datetime_parsing_variants() {
        let rfc = parse_datetime_flexible("2025-03-05T12:00:00Z").unwrap();
        assert_eq!(rfc.hour(), 12);

        // Midnight in Buenos Aires is 03:00 UTC
        let day = parse_datetime_flexible("2025-03-05").unwrap();
        assert_eq!(day.hour(), 3);
        assert_eq!(day.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());

        let local = parse_datetime_flexible("2025-03-05T09:30").unwrap();
        assert_eq!((local.hour(), local.minute()), (12, 30));

        assert_eq!(parse_datetime_flexible("mañana"), None);
    }

    #[test]
    fn test_es_ar_formats() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_fecha_ar(date), "5/3/2025");

        let ts = Utc.with_ymd_and_hms(2025, 3, 5, 17, 30, 0).unwrap();
        assert_eq!(format_fecha_hora_ar(ts), "5/3/2025, 14:30:00");
    }

    #[derive(Deserialize)]
    struct Medicion {
        #[serde(default, deserialize_with = "de_opt_f64")]
        ph: Option<f64>,
        #[serde(default, deserialize_with = "de_opt_i32")]
        humedad: Option<i32>,
    }

    #[test]
    fn test_form_numbers() {
        let m: Medicion = serde_json::from_str(r#"{"ph": "6,5", "humedad": 65.7}"#).unwrap();
        assert_eq!(m.ph, Some(6.5));
        assert_eq!(m.humedad, Some(65));

        let m: Medicion = serde_json::from_str(r#"{"ph": "", "humedad": null}"#).unwrap();
        assert_eq!(m.ph, None);
        assert_eq!(m.humedad, None);

        let m: Medicion = serde_json::from_str("{}").unwrap();
        assert_eq!(m.ph, None);

        assert!(serde_json::from_str::<Medicion>(r#"{"ph": "seis"}"#).is_err());
    }

    #[test]
    fn test_integer_fields_reject_out_of_range() {
        assert!(serde_json::from_str::<Medicion>(r#"{"humedad": "5000000000"}"#).is_err());
        assert!(serde_json::from_str::<Medicion>(r#"{"humedad": -3000000000}"#).is_err());

        let m: Medicion = serde_json::from_str(r#"{"humedad": "2147483647.9"}"#).unwrap();
        assert_eq!(m.humedad, Some(i32::MAX));
    }

    #[derive(Deserialize)]
    struct Pesaje {
        #[serde(default, deserialize_with = "de_opt_decimal")]
        gramos: Option<Decimal>,
    }

    #[test]
    fn test_decimal_fields_keep_written_digits() {
        let exacto = |json: &str| serde_json::from_str::<Pesaje>(json).unwrap().gramos;
        assert_eq!(exacto(r#"{"gramos": "2.675"}"#), Some(Decimal::from_str("2.675").unwrap()));
        assert_eq!(exacto(r#"{"gramos": 2.675}"#), Some(Decimal::from_str("2.675").unwrap()));
        assert_eq!(exacto(r#"{"gramos": "3,75"}"#), Some(Decimal::from_str("3.75").unwrap()));
        assert_eq!(exacto(r#"{"gramos": "1e3"}"#), Some(Decimal::from(1000)));
        assert_eq!(exacto(r#"{"gramos": ""}"#), None);
        assert_eq!(exacto("{}"), None);
        assert!(serde_json::from_str::<Pesaje>(r#"{"gramos": "dos"}"#).is_err());
    }

    #[test]
    fn test_uuid_field() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid_field(Some(id.to_string()), "x").unwrap(), id);
        assert!(parse_uuid_field(Some(String::new()), "x").is_err());
        assert!(parse_uuid_field(None, "x").is_err());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Cultivo  Norte 2"), "Cultivo-Norte-2");
    }
}
