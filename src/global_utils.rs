use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssignmentError {
	#[error("expected key=value, got \"{0}\"")]
	MissingSeparator(String),
	#[error("\"{0}\" is not a number between 0 and {max}", max = u32::MAX)]
	InvalidValue(String),
}

/// Splits a `key=value` pair as sent with the `SET-PROPERTY` action.
pub fn assignment_parser(input: &str) -> Result<(&str, u32), AssignmentError> {
	let Some((key, value)) = input.split_once('=') else {
		return Err(AssignmentError::MissingSeparator(input.to_owned()));
	};
	let key = key.trim();
	if key.is_empty() {
		return Err(AssignmentError::MissingSeparator(input.to_owned()));
	}
	let value = value.trim();
	match value.parse::<u32>() {
		Ok(value) => Ok((key, value)),
		Err(_) => Err(AssignmentError::InvalidValue(value.to_owned())),
	}
}
