use serde::{Deserialize, Serialize};

/// Metric names as they appear in acquisition results and form field specs.
pub mod metric {
    pub const FOLLOWERS: &str = "followers";
    pub const SUBSCRIBERS: &str = "subscribers";
    pub const VIEWS: &str = "views";
    pub const CANCELLATIONS: &str = "cancellations";
    pub const NET_NEW_SUBSCRIBERS: &str = "net_new_subscribers";
    pub const NEW_SUBSCRIBERS: &str = "new_subscribers";
}

const FOLLOWER_METRICS: &[&str] = &[metric::FOLLOWERS];
const NEWSLETTER_METRICS: &[&str] = &[metric::SUBSCRIBERS];
const CHANNEL_METRICS: &[&str] = &[metric::SUBSCRIBERS, metric::VIEWS];
const KIT_METRICS: &[&str] = &[
    metric::SUBSCRIBERS,
    metric::CANCELLATIONS,
    metric::NET_NEW_SUBSCRIBERS,
    metric::NEW_SUBSCRIBERS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Twitter,
    Instagram,
    Youtube,
    Kit,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Linkedin => write!(f, "linkedin"),
            Platform::Twitter => write!(f, "twitter"),
            Platform::Instagram => write!(f, "instagram"),
            Platform::Youtube => write!(f, "youtube"),
            Platform::Kit => write!(f, "kit"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Platform::Linkedin),
            "twitter" | "x" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            "youtube" => Ok(Platform::Youtube),
            "kit" | "convertkit" => Ok(Platform::Kit),
            other => Err(format!(
                "unknown platform '{other}' (expected linkedin, twitter, instagram, youtube or kit)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Profile,
    Company,
    Newsletter,
    Channel,
    Account,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Profile => write!(f, "profile"),
            EntityKind::Company => write!(f, "company"),
            EntityKind::Newsletter => write!(f, "newsletter"),
            EntityKind::Channel => write!(f, "channel"),
            EntityKind::Account => write!(f, "account"),
        }
    }
}

/// Reporting window of a Kit growth-stats target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitWindow {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for KitWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KitWindow::Daily => write!(f, "daily"),
            KitWindow::Weekly => write!(f, "weekly"),
            KitWindow::Monthly => write!(f, "monthly"),
        }
    }
}

/// One tracked account. `key` is the stable identifier the acquisition
/// result and the form field specs refer to.
///
/// `id` is platform specific: a public URL for LinkedIn, a username for
/// Twitter and Instagram, a channel id for YouTube. Kit targets use
/// `window` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTarget {
    pub key: String,
    pub platform: Platform,
    pub kind: EntityKind,
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub window: Option<KitWindow>,
}

impl AccountTarget {
    /// Metric names a successful acquisition of this target yields.
    #[must_use]
    pub fn metrics(&self) -> &'static [&'static str] {
        match (self.platform, self.kind) {
            (Platform::Linkedin, EntityKind::Newsletter) => NEWSLETTER_METRICS,
            (Platform::Youtube, _) => CHANNEL_METRICS,
            (Platform::Kit, _) => KIT_METRICS,
            _ => FOLLOWER_METRICS,
        }
    }

    /// Whether `kind` is a valid entity kind for `platform`.
    #[must_use]
    pub fn kind_allowed(&self) -> bool {
        matches!(
            (self.platform, self.kind),
            (
                Platform::Linkedin,
                EntityKind::Profile | EntityKind::Company | EntityKind::Newsletter
            ) | (
                Platform::Twitter | Platform::Instagram | Platform::Kit,
                EntityKind::Account
            ) | (Platform::Youtube, EntityKind::Channel)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(platform: Platform, kind: EntityKind) -> AccountTarget {
        AccountTarget {
            key: "t".to_string(),
            platform,
            kind,
            name: "T".to_string(),
            id: None,
            window: None,
        }
    }

    #[test]
    fn metrics_per_platform() {
        assert_eq!(
            target(Platform::Linkedin, EntityKind::Company).metrics(),
            &["followers"]
        );
        assert_eq!(
            target(Platform::Linkedin, EntityKind::Newsletter).metrics(),
            &["subscribers"]
        );
        assert_eq!(
            target(Platform::Youtube, EntityKind::Channel).metrics(),
            &["subscribers", "views"]
        );
        assert_eq!(target(Platform::Kit, EntityKind::Account).metrics().len(), 4);
    }

    #[test]
    fn kind_allowed_rejects_mismatches() {
        assert!(target(Platform::Linkedin, EntityKind::Profile).kind_allowed());
        assert!(target(Platform::Youtube, EntityKind::Channel).kind_allowed());
        assert!(!target(Platform::Twitter, EntityKind::Company).kind_allowed());
        assert!(!target(Platform::Linkedin, EntityKind::Channel).kind_allowed());
    }

    #[test]
    fn platform_parses_from_cli_names() {
        assert_eq!("Twitter".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!("x".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!("kit".parse::<Platform>(), Ok(Platform::Kit));
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_deserializes_lowercase() {
        let platform: Platform = serde_yaml::from_str("instagram").unwrap();
        assert_eq!(platform, Platform::Instagram);
        assert_eq!(platform.to_string(), "instagram");
    }
}
