use std::fmt;
use std::str::{self};

#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub enum ArgTypes {
	None = 0,
	KbdBrightnessRaise = 1,
	KbdBrightnessLower = 2,
	SetProperty = 3,
}

impl fmt::Display for ArgTypes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let string = match self {
			ArgTypes::None => "NONE",
			ArgTypes::KbdBrightnessRaise => "KBD-BRIGHTNESS-RAISE",
			ArgTypes::KbdBrightnessLower => "KBD-BRIGHTNESS-LOWER",
			ArgTypes::SetProperty => "SET-PROPERTY",
		};
		write!(f, "{}", string)
	}
}

impl str::FromStr for ArgTypes {
	type Err = String;

	fn from_str(input: &str) -> Result<Self, Self::Err> {
		let result = match input {
			"KBD-BRIGHTNESS-RAISE" => ArgTypes::KbdBrightnessRaise,
			"KBD-BRIGHTNESS-LOWER" => ArgTypes::KbdBrightnessLower,
			"SET-PROPERTY" => ArgTypes::SetProperty,
			other_type => return Err(other_type.to_owned()),
		};
		Ok(result)
	}
}
