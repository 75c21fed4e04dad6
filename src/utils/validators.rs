use rust_decimal::Decimal;
use validator::ValidationError;

pub const MIN_DESCRIPTION_LEN: usize = 10;

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("Description is required".into());
        return Err(err);
    }
    if description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        let mut err = ValidationError::new("length");
        err.message = Some(
            format!("Description must be at least {} characters", MIN_DESCRIPTION_LEN).into(),
        );
        return Err(err);
    }
    Ok(())
}

pub fn validate_proposed_cost(cost: Option<Decimal>) -> bool {
    matches!(cost, Some(c) if c > Decimal::ZERO)
}

pub fn validate_proposed_duration(duration: &str) -> bool {
    !duration.trim().is_empty()
}

pub fn sanitize_string(input: &str) -> String {
    input.trim().to_string()
}
