use switchboard_config::DispatchConfig;

use crate::error::{Error, Result};

/// Rules for turning a caller-supplied phone number into a network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonePolicy {
    country_code: String,
    national_len: usize,
    suffix: String,
}

impl Default for PhonePolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

impl PhonePolicy {
    pub fn new(
        country_code: impl Into<String>,
        national_len: usize,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            national_len,
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            config.default_country_code.clone(),
            config.national_number_length,
            config.address_suffix.clone(),
        )
    }

    /// Normalize `raw` into an addressable id.
    ///
    /// Non-digits are dropped. A bare national number gets the default
    /// country code; anything longer is taken as already international.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        if digits.len() < self.national_len {
            return Err(Error::InvalidPhone {
                input: raw.to_string(),
                min_digits: self.national_len,
            });
        }

        let number = if digits.len() == self.national_len {
            format!("{}{digits}", self.country_code)
        } else {
            digits
        };
        Ok(format!("{number}{}", self.suffix))
    }
}
