use std::fmt;
use std::str::FromStr;

/// The build target environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    /// Test builds include `test/` sources and wrapped unit tests.
    pub fn is_test(self) -> bool {
        self == Self::Test
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(UnknownEnvironment {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown environment `{value}`, expected development, test, or production")]
pub struct UnknownEnvironment {
    pub value: String,
}
