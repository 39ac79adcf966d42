//! Entry setup: token check and metering point selection
//!
//! Turns an API token (and optionally a preferred metering point) into the
//! [`EntryData`] the service runs with. Failures are classified into a small
//! set of user-facing errors, each with a stable key.

use crate::config::{BarryConfig, CURRENCY_EURO, CURRENCY_KRONE};
use crate::error::BarryError;
use crate::logging::get_logger;
use crate::source::{MeteringPoint, PriceSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data of a configured entry; persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub api_token: String,
    pub price_zone: String,
    pub mpid: String,
    pub currency: String,
    /// Metering point address, shown as the entry title
    pub title: String,
}

impl EntryData {
    pub fn unique_id(&self) -> &str {
        &self.mpid
    }

    /// Let non-empty configured settings win over the stored ones.
    ///
    /// Returns whether anything changed, so the caller can store the entry again.
    pub fn apply_config(&mut self, cfg: &BarryConfig) -> bool {
        let mut changed = false;
        for (stored, configured) in [
            (&mut self.api_token, cfg.api_token.trim()),
            (&mut self.price_zone, cfg.price_zone.trim()),
            (&mut self.currency, cfg.currency.trim()),
        ] {
            if !configured.is_empty() && stored.as_str() != configured {
                *stored = configured.to_string();
                changed = true;
            }
        }
        changed
    }
}

/// A selectable metering point when the account has several
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeteringPointOption {
    pub mpid: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("API token is required")]
    MissingToken,
    #[error("Invalid authentication")]
    InvalidAuth,
    #[error("Failed to connect")]
    CannotConnect,
    #[error("Unexpected error")]
    Unknown,
    #[error("No metering point found for this account")]
    NoMeteringPoint,
    #[error("Metering point {0} is not on this account")]
    InvalidMpid(String),
    #[error("Metering point is already configured")]
    AlreadyConfigured,
}

impl SetupError {
    /// Stable key used in form errors and translations
    pub fn key(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidAuth => "invalid_auth",
            Self::CannotConnect => "cannot_connect",
            Self::Unknown => "unknown",
            Self::NoMeteringPoint => "no_mpid_id_found",
            Self::InvalidMpid(_) => "invalid_mpid",
            Self::AlreadyConfigured => "already_configured",
        }
    }
}

/// Map a client error onto the user-facing setup errors
pub fn classify(err: &BarryError) -> SetupError {
    match err {
        BarryError::Auth { .. } => SetupError::InvalidAuth,
        BarryError::Network { .. } | BarryError::Timeout { .. } => SetupError::CannotConnect,
        _ => SetupError::Unknown,
    }
}

/// Currency of a metering point, from its country
pub fn currency_for(point: &MeteringPoint) -> &'static str {
    match point.country.as_deref() {
        Some(c) if c.eq_ignore_ascii_case("DK") => CURRENCY_KRONE,
        _ => CURRENCY_EURO,
    }
}

/// Stored entry to reuse instead of running discovery again.
///
/// Any stored entry matches when no metering point is preferred.
pub fn reusable_entry(stored: Option<EntryData>, preferred_mpid: Option<&str>) -> Option<EntryData> {
    let entry = stored?;
    match preferred_mpid.filter(|m| !m.is_empty()) {
        Some(mpid) if mpid != entry.mpid => None,
        _ => Some(entry),
    }
}

/// Result of the user step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupStep {
    Created(EntryData),
    /// Several metering points and none preferred; pick one and retry
    ChooseMeteringPoint(Vec<MeteringPointOption>),
}

pub struct SetupFlow<'a> {
    source: &'a dyn PriceSource,
    configured: Vec<String>,
}

impl<'a> SetupFlow<'a> {
    /// `configured` holds the mpids that already have an entry
    pub fn new(source: &'a dyn PriceSource, configured: Vec<String>) -> Self {
        Self { source, configured }
    }

    /// List the account's metering points, classifying failures
    pub async fn discover(&self) -> Result<Vec<MeteringPoint>, SetupError> {
        let logger = get_logger("setup");
        match self.source.metering_points().await {
            Ok(points) => Ok(points),
            Err(e) => {
                let classified = classify(&e);
                if classified == SetupError::Unknown {
                    logger.error(&format!("Unexpected error listing metering points: {}", e));
                } else {
                    logger.warn(&format!("Metering point lookup failed: {}", e));
                }
                Err(classified)
            }
        }
    }

    /// Validate the token and produce an entry, or the choices to pick from
    pub async fn step_user(
        &self,
        api_token: &str,
        preferred_mpid: Option<&str>,
    ) -> Result<SetupStep, SetupError> {
        if api_token.trim().is_empty() {
            return Err(SetupError::MissingToken);
        }

        let points = self.discover().await?;
        if points.is_empty() {
            return Err(SetupError::NoMeteringPoint);
        }

        let chosen = match (preferred_mpid.filter(|m| !m.is_empty()), points.len()) {
            (Some(mpid), _) => points
                .iter()
                .find(|p| p.mpid == mpid)
                .ok_or_else(|| SetupError::InvalidMpid(mpid.to_string()))?,
            (None, 1) => &points[0],
            (None, _) => {
                return Ok(SetupStep::ChooseMeteringPoint(
                    points
                        .iter()
                        .map(|p| MeteringPointOption {
                            mpid: p.mpid.clone(),
                            label: format!("Barry - {}", p.address),
                        })
                        .collect(),
                ));
            }
        };

        if self.configured.iter().any(|m| m == &chosen.mpid) {
            return Err(SetupError::AlreadyConfigured);
        }

        Ok(SetupStep::Created(EntryData {
            api_token: api_token.trim().to_string(),
            price_zone: chosen.price_code.clone(),
            mpid: chosen.mpid.clone(),
            currency: currency_for(chosen).to_string(),
            title: chosen.address.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_keys() {
        assert_eq!(classify(&BarryError::auth("401")).key(), "invalid_auth");
        assert_eq!(classify(&BarryError::network("refused")).key(), "cannot_connect");
        assert_eq!(classify(&BarryError::timeout("10s")).key(), "cannot_connect");
        assert_eq!(classify(&BarryError::api("HTTP 500")).key(), "unknown");
        assert_eq!(SetupError::NoMeteringPoint.key(), "no_mpid_id_found");
    }

    #[test]
    fn danish_points_use_krone() {
        let mut point = MeteringPoint {
            mpid: "1".into(),
            address: "a".into(),
            price_code: "DK1".into(),
            country: Some("DK".into()),
        };
        assert_eq!(currency_for(&point), "kr.");
        point.country = Some("ES".into());
        assert_eq!(currency_for(&point), "€");
        point.country = None;
        assert_eq!(currency_for(&point), "€");
    }

    #[test]
    fn stored_entry_reused_only_for_same_mpid() {
        let entry = EntryData {
            api_token: "t".into(),
            price_zone: "DK1".into(),
            mpid: "1".into(),
            currency: "kr.".into(),
            title: "Vej 1".into(),
        };
        assert_eq!(reusable_entry(Some(entry.clone()), None), Some(entry.clone()));
        assert_eq!(reusable_entry(Some(entry.clone()), Some("1")), Some(entry.clone()));
        assert_eq!(reusable_entry(Some(entry), Some("2")), None);
        assert_eq!(reusable_entry(None, None), None);
    }

    #[test]
    fn configured_settings_override_stored_entry() {
        let mut entry = EntryData {
            api_token: "old".into(),
            price_zone: "DK1".into(),
            mpid: "1".into(),
            currency: "kr.".into(),
            title: "Vej 1".into(),
        };
        let mut cfg = BarryConfig::default();
        assert!(!entry.apply_config(&cfg));
        assert_eq!(entry.api_token, "old");
        assert_eq!(entry.currency, "kr.");

        cfg.api_token = " rotated ".into();
        assert!(entry.apply_config(&cfg));
        assert_eq!(entry.api_token, "rotated");
        assert!(!entry.apply_config(&cfg));

        cfg.currency = "DKK".into();
        cfg.price_zone = "DK2".into();
        assert!(entry.apply_config(&cfg));
        assert_eq!(entry.currency, "DKK");
        assert_eq!(entry.price_zone, "DK2");
        assert_eq!(entry.mpid, "1");
    }

    struct Account(std::result::Result<Vec<MeteringPoint>, BarryError>);

    #[async_trait::async_trait]
    impl PriceSource for Account {
        async fn fetch_price(
            &self,
            _start: chrono::DateTime<chrono::Utc>,
            _end: chrono::DateTime<chrono::Utc>,
            _mpid: &str,
        ) -> crate::error::Result<f64> {
            Ok(0.0)
        }

        async fn metering_points(&self) -> crate::error::Result<Vec<MeteringPoint>> {
            self.0.clone()
        }
    }

    fn point(mpid: &str, address: &str, country: &str) -> MeteringPoint {
        MeteringPoint {
            mpid: mpid.into(),
            address: address.into(),
            price_code: "DK1".into(),
            country: Some(country.into()),
        }
    }

    #[tokio::test]
    async fn single_point_creates_entry() {
        let source = Account(Ok(vec![point("571313100000000001", "Vej 1", "DK")]));
        let step = SetupFlow::new(&source, Vec::new())
            .step_user(" token ", None)
            .await
            .unwrap();
        let SetupStep::Created(entry) = step else {
            panic!("expected an entry");
        };
        assert_eq!(entry.api_token, "token");
        assert_eq!(entry.currency, "kr.");
        assert_eq!(entry.price_zone, "DK1");
        assert_eq!(entry.title, "Vej 1");
        assert_eq!(entry.unique_id(), "571313100000000001");
    }

    #[tokio::test]
    async fn several_points_ask_for_a_choice() {
        let source = Account(Ok(vec![point("1", "Vej 1", "DK"), point("2", "Calle 2", "ES")]));
        let flow = SetupFlow::new(&source, Vec::new());
        let SetupStep::ChooseMeteringPoint(options) = flow.step_user("t", None).await.unwrap()
        else {
            panic!("expected a choice");
        };
        assert_eq!(options[1].label, "Barry - Calle 2");

        let SetupStep::Created(entry) = flow.step_user("t", Some("2")).await.unwrap() else {
            panic!("expected an entry");
        };
        assert_eq!(entry.currency, "€");

        assert_eq!(
            flow.step_user("t", Some("3")).await.unwrap_err(),
            SetupError::InvalidMpid("3".into())
        );
    }

    #[tokio::test]
    async fn setup_failures_are_classified() {
        let empty = Account(Ok(Vec::new()));
        let flow = SetupFlow::new(&empty, Vec::new());
        assert_eq!(flow.step_user("t", None).await.unwrap_err().key(), "no_mpid_id_found");
        assert_eq!(flow.step_user("  ", None).await.unwrap_err(), SetupError::MissingToken);

        let denied = Account(Err(BarryError::auth("HTTP 401")));
        let flow = SetupFlow::new(&denied, Vec::new());
        assert_eq!(flow.step_user("t", None).await.unwrap_err(), SetupError::InvalidAuth);

        let known = Account(Ok(vec![point("1", "Vej 1", "DK")]));
        let flow = SetupFlow::new(&known, vec!["1".into()]);
        assert_eq!(flow.step_user("t", None).await.unwrap_err(), SetupError::AlreadyConfigured);
    }
}
