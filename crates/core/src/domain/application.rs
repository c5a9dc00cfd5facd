use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// The fixed set of applications a restart can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    Cbp,
    OpenAccess,
    ImageServer,
    SpacePlanning,
}

impl Application {
    pub const ALL: [Application; 4] =
        [Self::Cbp, Self::OpenAccess, Self::ImageServer, Self::SpacePlanning];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cbp => "cbp",
            Self::OpenAccess => "Open Access",
            Self::ImageServer => "Image Server",
            Self::SpacePlanning => "Space Planning",
        }
    }

    /// Name of the matching record in the remote `apps` sequence.
    pub fn record_name(&self) -> &'static str {
        match self {
            Self::Cbp => "cbp",
            Self::OpenAccess => "open-access",
            Self::ImageServer => "image-server",
            Self::SpacePlanning => "space-planning",
        }
    }

    pub fn display_names() -> Vec<String> {
        Self::ALL.iter().map(|application| application.display_name().to_string()).collect()
    }

    /// Accepts display, kebab, snake and compact spellings, ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        let compact = raw
            .trim()
            .chars()
            .filter(|character| !matches!(character, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "cbp" => Some(Self::Cbp),
            "openaccess" => Some(Self::OpenAccess),
            "imageserver" => Some(Self::ImageServer),
            "spaceplanning" => Some(Self::SpacePlanning),
            _ => None,
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Application {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| ValidationError::UnknownApplication {
            application: value.to_string(),
            available: Self::display_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Application;
    use crate::errors::ValidationError;

    #[test]
    fn parses_every_documented_spelling() {
        for raw in ["Open Access", "open-access", "open_access", "OpenAccess", " OPEN ACCESS "] {
            assert_eq!(Application::parse(raw), Some(Application::OpenAccess), "{raw}");
        }
        assert_eq!(Application::parse("CBP"), Some(Application::Cbp));
        assert_eq!(Application::parse("image-server"), Some(Application::ImageServer));
        assert_eq!(Application::parse("Space Planning"), Some(Application::SpacePlanning));
    }

    #[test]
    fn record_names_follow_fixed_mapping() {
        let names = Application::ALL.iter().map(Application::record_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["cbp", "open-access", "image-server", "space-planning"]);
    }

    #[test]
    fn unknown_application_lists_the_fixed_set() {
        let error = "mainframe".parse::<Application>().expect_err("not a known application");
        assert!(matches!(error, ValidationError::UnknownApplication { .. }));
        assert_eq!(
            error.to_string(),
            "Application 'mainframe' not recognized. Available applications: cbp, Open Access, Image Server, Space Planning"
        );
    }
}
