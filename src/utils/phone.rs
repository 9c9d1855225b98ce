use std::fmt;

/// A phone number in E.164 form, e.g. `+94771234567`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        let digits = match compact.strip_prefix('+') {
            Some(rest) => rest,
            None => compact
                .strip_prefix("00")
                .ok_or_else(|| "Phone number must start with a country code".to_string())?,
        };

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err("Phone number may only contain digits".to_string());
        }
        if !(8..=15).contains(&digits.len()) || digits.starts_with('0') {
            return Err("Enter a valid phone number".to_string());
        }

        Ok(Self(format!("+{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
