//! Field-validator pipeline (§4.2).
//!
//! Each [`FieldKind`] runs the same six-stage pipeline — empty handling,
//! clean, length, pattern, semantic check, normalize — with kind-specific
//! behavior plugged in at each stage. The pipeline is a pure function of its
//! inputs: no field kind carries mutable state, matching the "model them as
//! values" guidance in §9.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of field kinds a validator can be invoked with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Name,
    City,
    Address,
    Email,
    Phone,
    TaxIdPerson,
    TaxIdOrg,
    Cep,
    Date,
    BirthDate,
    Currency,
    /// Free text with only a minimum length — used for `interest`,
    /// `urgency`, and any `QUESTION` that doesn't name a stricter kind.
    Text,
}

impl FieldKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "name" | "nome" => FieldKind::Name,
            "city" | "cidade" => FieldKind::City,
            "address" | "endereco" | "endereço" => FieldKind::Address,
            "email" => FieldKind::Email,
            "phone" | "telefone" | "celular" => FieldKind::Phone,
            "taxid" | "taxid_person" | "cpf" => FieldKind::TaxIdPerson,
            "taxid_org" | "cnpj" => FieldKind::TaxIdOrg,
            "cep" | "postal_code" => FieldKind::Cep,
            "date" => FieldKind::Date,
            "birthdate" | "data_nascimento" => FieldKind::BirthDate,
            "currency" | "budget" | "orcamento" => FieldKind::Currency,
            _ => FieldKind::Text,
        }
    }
}

/// Error codes from §7's validator row; part of the stable contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    Required,
    TooShort,
    TooLong,
    InvalidFormat,
    InvalidChecksum,
    InvalidValue,
}

/// A tagged-sum value for collected data (§3: "`value` a tagged sum
/// (string | number | bool)").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::String(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::String(s) => s.trim().is_empty(),
            FieldValue::Number(_) | FieldValue::Bool(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{s}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Outcome of running [`validate`] on a single raw input.
#[derive(Clone, Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub cleaned_value: Option<FieldValue>,
    pub error_code: Option<ValidationErrorCode>,
    pub error_message: Option<String>,
    pub original_value: Option<String>,
}

impl ValidationResult {
    fn ok(cleaned: Option<FieldValue>, original: Option<&str>) -> Self {
        ValidationResult {
            is_valid: true,
            cleaned_value: cleaned,
            error_code: None,
            error_message: None,
            original_value: original.map(str::to_string),
        }
    }

    fn fail(code: ValidationErrorCode, message: impl Into<String>, original: Option<&str>) -> Self {
        ValidationResult {
            is_valid: false,
            cleaned_value: None,
            error_code: Some(code),
            error_message: Some(message.into()),
            original_value: original.map(str::to_string),
        }
    }
}

/// Run the six-stage pipeline for a single field.
///
/// `raw` is the user's text input as received; `None` or all-whitespace is
/// treated as empty per stage 1.
pub fn validate(kind: FieldKind, raw: Option<&str>, required: bool) -> ValidationResult {
    let trimmed = raw.map(str::trim).filter(|s| !s.is_empty());

    // Stage 1: empty handling.
    let Some(value) = trimmed else {
        return if required {
            ValidationResult::fail(ValidationErrorCode::Required, "This field is required", raw)
        } else {
            ValidationResult::ok(None, raw)
        };
    };

    // Stage 2: clean.
    let cleaned = clean(kind, value);

    // Stage 3: length.
    if let Some(min) = min_len(kind) {
        if cleaned.chars().count() < min {
            return ValidationResult::fail(
                ValidationErrorCode::TooShort,
                default_error(kind),
                Some(value),
            );
        }
    }
    if let Some(max) = max_len(kind) {
        if cleaned.chars().count() > max {
            return ValidationResult::fail(ValidationErrorCode::TooLong, default_error(kind), Some(value));
        }
    }

    // Stage 4: pattern.
    if let Err(msg) = check_pattern(kind, &cleaned) {
        return ValidationResult::fail(ValidationErrorCode::InvalidFormat, msg, Some(value));
    }

    // Stage 5: semantic checker.
    let checked = match semantic_check(kind, &cleaned) {
        Ok(v) => v,
        Err((code, msg)) => return ValidationResult::fail(code, msg, Some(value)),
    };

    // Stage 6: normalize.
    let normalized = normalize(kind, &checked);
    ValidationResult::ok(Some(normalized), Some(value))
}

/// Validate a whole map of raw inputs at once, per §4.2's `validate_many`.
/// Returns `(cleaned, errors)`; a field absent from `required` defaults to
/// not-required.
pub fn validate_many(
    inputs: &std::collections::HashMap<String, (Option<String>, FieldKind)>,
    required: &std::collections::HashSet<String>,
) -> (
    std::collections::HashMap<String, FieldValue>,
    std::collections::HashMap<String, ValidationResult>,
) {
    let mut clean_map = std::collections::HashMap::new();
    let mut results = std::collections::HashMap::new();

    for (field, (raw, kind)) in inputs {
        let result = validate(*kind, raw.as_deref(), required.contains(field));
        if result.is_valid {
            if let Some(v) = &result.cleaned_value {
                clean_map.insert(field.clone(), v.clone());
            }
        }
        results.insert(field.clone(), result);
    }

    (clean_map, results)
}

fn min_len(kind: FieldKind) -> Option<usize> {
    match kind {
        FieldKind::Name | FieldKind::City => Some(2),
        FieldKind::Address => Some(5),
        FieldKind::Email => Some(5),
        FieldKind::Text => Some(1),
        _ => None,
    }
}

fn max_len(kind: FieldKind) -> Option<usize> {
    match kind {
        FieldKind::Name | FieldKind::City => Some(100),
        FieldKind::Address => Some(200),
        FieldKind::Email => Some(254),
        FieldKind::Text => Some(2000),
        _ => None,
    }
}

fn clean(kind: FieldKind, value: &str) -> String {
    match kind {
        FieldKind::Email => value.to_lowercase(),
        FieldKind::Phone | FieldKind::TaxIdPerson | FieldKind::TaxIdOrg | FieldKind::Cep => {
            value.chars().filter(|c| c.is_ascii_digit()).collect()
        }
        FieldKind::Name | FieldKind::City | FieldKind::Address | FieldKind::Text => {
            value.split_whitespace().collect::<Vec<_>>().join(" ")
        }
        FieldKind::Currency => value.to_string(),
        FieldKind::Date | FieldKind::BirthDate => value.to_string(),
    }
}

fn default_error(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Name => "Name must be at least 2 characters",
        FieldKind::City => "City must be at least 2 characters",
        FieldKind::Address => "Address must be at least 5 characters",
        FieldKind::Email => "Email looks too short",
        FieldKind::Text => "This field cannot be empty",
        _ => "Invalid value",
    }
}

fn check_pattern(kind: FieldKind, cleaned: &str) -> Result<(), &'static str> {
    match kind {
        FieldKind::Email => {
            let re = email_regex();
            if re.is_match(cleaned) {
                Ok(())
            } else {
                Err("Invalid email. Example: name@example.com")
            }
        }
        FieldKind::Phone => {
            let digits = normalize_phone_digits(cleaned);
            if digits.len() == 10 || digits.len() == 11 {
                Ok(())
            } else {
                Err("Invalid phone number. Include area code (10 or 11 digits)")
            }
        }
        FieldKind::TaxIdPerson => {
            if cleaned.len() == 11 {
                Ok(())
            } else {
                Err("Tax ID must have 11 digits")
            }
        }
        FieldKind::TaxIdOrg => {
            if cleaned.len() == 14 {
                Ok(())
            } else {
                Err("Organization tax ID must have 14 digits")
            }
        }
        FieldKind::Cep => {
            if cleaned.len() == 8 {
                Ok(())
            } else {
                Err("Postal code must have 8 digits")
            }
        }
        _ => Ok(()),
    }
}

fn email_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[A-Za-z]{2,}$").unwrap())
}

/// Strips a leading Brazilian country code (`55`) when the digit string is
/// 12–13 digits long, per §4.2's phone rule.
fn normalize_phone_digits(digits: &str) -> String {
    if (digits.len() == 12 || digits.len() == 13) && digits.starts_with("55") {
        digits[2..].to_string()
    } else {
        digits.to_string()
    }
}

fn semantic_check(kind: FieldKind, cleaned: &str) -> Result<String, (ValidationErrorCode, &'static str)> {
    match kind {
        FieldKind::TaxIdPerson => {
            if validate_cpf_checksum(cleaned) {
                Ok(cleaned.to_string())
            } else {
                Err((ValidationErrorCode::InvalidChecksum, "Invalid tax ID checksum"))
            }
        }
        FieldKind::TaxIdOrg => {
            if validate_cnpj_checksum(cleaned) {
                Ok(cleaned.to_string())
            } else {
                Err((ValidationErrorCode::InvalidChecksum, "Invalid organization tax ID checksum"))
            }
        }
        FieldKind::Date => validate_date(cleaned, false)
            .map(|_| cleaned.to_string())
            .map_err(|m| (ValidationErrorCode::InvalidValue, m)),
        FieldKind::BirthDate => validate_date(cleaned, true)
            .map(|_| cleaned.to_string())
            .map_err(|m| (ValidationErrorCode::InvalidValue, m)),
        FieldKind::Currency => parse_currency(cleaned)
            .map(|v| v.to_string())
            .map_err(|m| (ValidationErrorCode::InvalidValue, m)),
        _ => Ok(cleaned.to_string()),
    }
}

fn normalize(kind: FieldKind, checked: &str) -> FieldValue {
    match kind {
        FieldKind::Name | FieldKind::City => FieldValue::String(title_case(checked)),
        FieldKind::Phone => FieldValue::String(normalize_phone_digits(checked)),
        FieldKind::TaxIdPerson | FieldKind::TaxIdOrg | FieldKind::Cep => FieldValue::String(checked.to_string()),
        FieldKind::Date | FieldKind::BirthDate => {
            FieldValue::String(canonical_date(checked).unwrap_or_else(|| checked.to_string()))
        }
        FieldKind::Currency => FieldValue::Number(parse_currency(checked).unwrap_or(0.0)),
        FieldKind::Email | FieldKind::Address | FieldKind::Text => FieldValue::String(checked.to_string()),
    }
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First CPF-style check digit per §4.2's weight formula.
fn cpf_digit(digits: &[u32], weight_start: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

fn validate_cpf_checksum(cpf: &str) -> bool {
    if cpf.len() != 11 {
        return false;
    }
    let digits: Vec<u32> = match cpf.chars().map(|c| c.to_digit(10)).collect() {
        Some(d) => d,
        None => return false,
    };
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }
    let d1 = cpf_digit(&digits[0..9], 10);
    if d1 != digits[9] {
        return false;
    }
    let d2 = cpf_digit(&digits[0..10], 11);
    d2 == digits[10]
}

fn cnpj_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

fn validate_cnpj_checksum(cnpj: &str) -> bool {
    if cnpj.len() != 14 {
        return false;
    }
    let digits: Vec<u32> = match cnpj.chars().map(|c| c.to_digit(10)).collect() {
        Some(d) => d,
        None => return false,
    };
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }
    const W1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const W2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let d1 = cnpj_digit(&digits[0..12], &W1);
    if d1 != digits[12] {
        return false;
    }
    let d2 = cnpj_digit(&digits[0..13], &W2);
    d2 == digits[13]
}

/// Parsed calendar date, used only internally to validate ranges before
/// canonicalizing back to a string.
struct ParsedDate {
    day: u32,
    month: u32,
    year: i32,
}

fn try_parse_date(value: &str) -> Option<ParsedDate> {
    let formats: [(char, [usize; 3]); 1] = [('/', [0, 1, 2])]; // placeholder, replaced below
    let _ = formats;

    let parts_dmy = |sep: char| -> Option<(u32, u32, i32)> {
        let parts: Vec<&str> = value.split(sep).collect();
        if parts.len() != 3 {
            return None;
        }
        let day: u32 = parts[0].parse().ok()?;
        let month: u32 = parts[1].parse().ok()?;
        let year: i32 = parts[2].parse().ok()?;
        Some((day, month, year))
    };
    let parts_ymd = |sep: char| -> Option<(u32, u32, i32)> {
        let parts: Vec<&str> = value.split(sep).collect();
        if parts.len() != 3 {
            return None;
        }
        let year: i32 = parts[0].parse().ok()?;
        let month: u32 = parts[1].parse().ok()?;
        let day: u32 = parts[2].parse().ok()?;
        Some((day, month, year))
    };

    let (day, month, year) = if value.contains('-') && value.split('-').next().map(|p| p.len()) == Some(4) {
        parts_ymd('-')?
    } else if value.contains('/') && value.split('/').next().map(|p| p.len()) == Some(4) {
        parts_ymd('/')?
    } else if value.contains('/') {
        parts_dmy('/')?
    } else if value.contains('-') {
        parts_dmy('-')?
    } else if value.contains('.') {
        parts_dmy('.')?
    } else {
        return None;
    };

    Some(ParsedDate { day, month, year })
}

fn days_in_month(month: u32, year: i32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
            if leap {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn validate_date(value: &str, is_birth: bool) -> Result<ParsedDate, &'static str> {
    let parsed = try_parse_date(value).ok_or("Invalid date format")?;
    if parsed.month < 1 || parsed.month > 12 {
        return Err("Invalid month");
    }
    if parsed.day < 1 || parsed.day > days_in_month(parsed.month, parsed.year) {
        return Err("Invalid day");
    }
    if parsed.year < 1900 || parsed.year > 2100 {
        return Err("Invalid year");
    }
    if is_birth {
        let today = chrono::Utc::now().date_naive();
        let date = chrono::NaiveDate::from_ymd_opt(parsed.year, parsed.month, parsed.day)
            .ok_or("Invalid date")?;
        if date >= today {
            return Err("Birth date must be in the past");
        }
        let age_days = (today - date).num_days();
        if age_days as f64 / 365.25 > 150.0 {
            return Err("Birth date implies an age over 150 years");
        }
    }
    Ok(parsed)
}

fn canonical_date(value: &str) -> Option<String> {
    let parsed = try_parse_date(value)?;
    Some(format!("{:02}/{:02}/{:04}", parsed.day, parsed.month, parsed.year))
}

/// Parses both `1.234,56` (pt-BR) and `1,234.56` (en-US) style currency
/// strings after stripping symbols, per §4.2.
fn parse_currency(value: &str) -> Result<f64, &'static str> {
    let stripped: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();
    if stripped.is_empty() {
        return Err("Missing currency value");
    }

    let last_comma = stripped.rfind(',');
    let last_dot = stripped.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => {
            // comma is the decimal separator, dots are thousands
            stripped.replace('.', "").replace(',', ".")
        }
        (Some(c), Some(d)) if d > c => {
            // dot is the decimal separator, commas are thousands
            stripped.replace(',', "")
        }
        (Some(_), None) => stripped.replace(',', "."),
        (None, Some(d)) => {
            // No comma present: a lone dot followed by exactly three digits
            // reads as a pt-BR thousands separator ("800.000" -> 800000),
            // not a decimal point.
            let digits_after = stripped.len() - d - 1;
            if stripped.matches('.').count() == 1 && digits_after == 3 {
                stripped.replace('.', "")
            } else {
                stripped
            }
        }
        _ => stripped,
    };

    let amount: f64 = normalized.parse().map_err(|_| "Could not parse currency value")?;
    if amount < 0.0 {
        return Err("Currency value must be non-negative");
    }
    Ok(amount)
}
