/// `FromStr` for a clap `ValueEnum` so settings files and env vars accept
/// the same spellings as the flag, aliases included.
macro_rules! value_enum_from_str {
    ($enum_type:ty, $what:literal) => {
        impl FromStr for $enum_type {
            type Err = $crate::primitives::ConfigError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let wanted = raw.trim();
                Self::value_variants()
                    .iter()
                    .copied()
                    .find(|candidate| {
                        candidate
                            .to_possible_value()
                            .is_some_and(|possible| possible.matches(wanted, true))
                    })
                    .ok_or_else(|| $crate::primitives::ConfigError::ParseError {
                        value: raw.to_string(),
                        reason: format!("unknown {}", $what),
                    })
            }
        }
    };
}

pub(crate) use value_enum_from_str;
