use chrono::{TimeZone, Utc};
use getrandom::fill;

use crate::error::{AppError, AppResult};

pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn ts_to_rfc3339(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .unwrap_or_default()
        .to_rfc3339()
}

/// Random bytes from the platform source.
pub fn random_bytes(len: usize) -> AppResult<Vec<u8>> {
    let mut out = vec![0u8; len];
    fill(&mut out).map_err(|e| AppError::internal(format!("random source unavailable: {e}")))?;
    Ok(out)
}

pub fn hex_encode(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(LUT[(b >> 4) as usize] as char);
        out.push(LUT[(b & 0x0f) as usize] as char);
    }
    out
}

pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn random_base36(len: usize) -> AppResult<String> {
    Ok(random_bytes(len)?
        .into_iter()
        .map(|b| BASE36[(b % 36) as usize] as char)
        .collect())
}

/// `order_{millis}_{8 base36}`.
pub fn generate_order_id() -> AppResult<String> {
    Ok(format!("order_{}_{}", now_millis(), random_base36(8)?))
}

/// `admin_grant_{millis}_{6 base36}`.
pub fn generate_grant_order_id() -> AppResult<String> {
    Ok(format!("admin_grant_{}_{}", now_millis(), random_base36(6)?))
}

/// 160-bit password-reset token, hex-encoded.
pub fn generate_reset_token() -> AppResult<String> {
    Ok(hex_encode(&random_bytes(20)?))
}

fn random_u32() -> AppResult<u32> {
    let b = random_bytes(4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Six decimal digits, leading zeros allowed.
pub fn generate_verification_code() -> AppResult<String> {
    Ok(format!("{:06}", random_u32()? % 1_000_000))
}

/// One draw of the simulated payment processor: approves roughly 90% of attempts.
pub fn simulated_payment_approved() -> AppResult<bool> {
    Ok(random_u32()? % 100 < 90)
}

/// Parse a decimal money string or number into cents, rounding half away from zero.
pub fn parse_cents(raw: &str) -> Option<i64> {
    let v: f64 = raw.trim().parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some((v * 100.0).round() as i64)
}

/// `1234` -> `"12.34"`, `-100` -> `"-1.00"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub fn cents_to_f64(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn hex_roundtrip() {
        let bytes = [0u8, 1, 0xab, 0xff];
        assert_eq!(hex_encode(&bytes), "0001abff");
        assert_eq!(hex_decode("0001abff").unwrap(), bytes.to_vec());
        assert!(hex_decode("abc").is_none());
        assert!(hex_decode("zz").is_none());
    }

    #[test]
    fn id_shapes() {
        let id = generate_order_id().unwrap();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "order");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].bytes().all(|c| BASE36.contains(&c)));

        assert!(generate_grant_order_id().unwrap().starts_with("admin_grant_"));
        assert_eq!(generate_reset_token().unwrap().len(), 40);

        let code = generate_verification_code().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn random_values_are_not_constant() {
        assert_eq!(random_bytes(32).unwrap().len(), 32);
        assert_ne!(random_bytes(32).unwrap(), vec![0u8; 32]);
        assert_ne!(generate_reset_token().unwrap(), generate_reset_token().unwrap());
        assert_ne!(random_base36(16).unwrap(), random_base36(16).unwrap());
    }

    #[rstest]
    #[case("12.34", Some(1234))]
    #[case("0", Some(0))]
    #[case("-1", Some(-100))]
    #[case(" 5 ", Some(500))]
    #[case("abc", None)]
    #[case("NaN", None)]
    fn parses_cents(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_cents(raw), expected);
    }

    #[rstest]
    #[case(1234, "12.34")]
    #[case(5, "0.05")]
    #[case(-100, "-1.00")]
    #[case(0, "0.00")]
    fn formats_cents(#[case] cents: i64, #[case] expected: &str) {
        assert_eq!(format_cents(cents), expected);
    }
}
