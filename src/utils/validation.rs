use crate::utils::error::{BookError, Result};
use std::collections::HashSet;
use std::hash::Hash;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(BookError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BookError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BookError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 找出第一個重複的值
pub fn validate_unique<T, I>(field_name: &str, values: I) -> Result<()>
where
    T: Eq + Hash + std::fmt::Display,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    for value in values {
        let rendered = value.to_string();
        if !seen.insert(value) {
            return Err(BookError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: rendered,
                reason: "Duplicate value".to_string(),
            });
        }
    }
    Ok(())
}
