use super::{ClaimField, ClaimPortal, Credentials, Located, Target};
use crate::error::PortalError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(s: impl Into<String>) -> Self {
        Self::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Self::XPath(s.into())
    }

    fn with_trip(&self, trip_id: &str) -> Self {
        match self {
            Self::Css(s) => Self::Css(s.replace("{trip_id}", trip_id)),
            Self::XPath(s) => Self::XPath(s.replace("{trip_id}", trip_id)),
        }
    }
}

/// One named way of finding an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub name: &'static str,
    pub selector: Selector,
}

impl Strategy {
    pub fn new(name: &'static str, selector: Selector) -> Self {
        Self { name, selector }
    }
}

/// Selector-level browser primitives. Owned by an external driver; this
/// crate only sequences them.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), PortalError>;
    async fn exists(&mut self, selector: &Selector) -> Result<bool, PortalError>;
    async fn click(&mut self, selector: &Selector) -> Result<(), PortalError>;
    /// Replace the element's value with `text`
    async fn type_text(&mut self, selector: &Selector, text: &str) -> Result<(), PortalError>;
    async fn attach_file(&mut self, selector: &Selector, path: &Path) -> Result<(), PortalError>;
    async fn body_text(&mut self) -> Result<String, PortalError>;
    async fn screenshot(&mut self) -> Result<Vec<u8>, PortalError>;
}

/// Prioritized selector lists for every target on the hosting platform.
/// `{trip_id}` in a selector is replaced by the trip being handled.
#[derive(Debug, Clone)]
pub struct SelectorProfile {
    pub login_path: String,
    pub trip_path: String,
    pub trips_list_path: String,
    pub login_identifier: Vec<Strategy>,
    pub login_secret: Vec<Strategy>,
    pub login_submit: Vec<Strategy>,
    pub logged_in: Vec<Strategy>,
    pub trip_loaded: Vec<Strategy>,
    pub trip_link: Vec<Strategy>,
    pub claim_entry: Vec<Strategy>,
    pub category: Vec<Strategy>,
    pub amount: Vec<Strategy>,
    pub description: Vec<Strategy>,
    pub location: Vec<Strategy>,
    pub evidence_input: Vec<Strategy>,
    pub submit: Vec<Strategy>,
}

impl Default for SelectorProfile {
    fn default() -> Self {
        use Selector as S;
        let st = Strategy::new;
        Self {
            login_path: "/login".to_string(),
            trip_path: "/reservation/{trip_id}".to_string(),
            trips_list_path: "/trips/booked".to_string(),
            login_identifier: vec![
                st("email-input", S::css("input[type=\"email\"]")),
                st("email-name", S::css("input[name=\"email\"]")),
            ],
            login_secret: vec![
                st("password-input", S::css("input[type=\"password\"]")),
                st("password-name", S::css("input[name=\"password\"]")),
            ],
            login_submit: vec![
                st("submit-button", S::css("button[type=\"submit\"]")),
                st("login-text", S::xpath("//button[contains(., 'Log in')]")),
            ],
            logged_in: vec![
                st("dashboard-testid", S::css("[data-testid=\"host-dashboard\"]")),
                st("trips-nav", S::css("a[href*=\"/trips\"]")),
            ],
            trip_loaded: vec![
                st("reservation-testid", S::css("[data-testid=\"reservation-details\"]")),
                st("reservation-class", S::css(".reservation-details")),
                st("trip-heading", S::xpath("//h1[contains(., 'Trip')]")),
            ],
            trip_link: vec![
                st("href-contains-id", S::css("a[href*=\"{trip_id}\"]")),
                st("text-contains-id", S::xpath("//*[contains(text(), '{trip_id}')]")),
            ],
            claim_entry: vec![
                st("incident-testid", S::css("[data-testid=\"report-incident\"]")),
                st("claims-link", S::css("a[href*=\"claims\"]")),
                st("reimbursement-button", S::xpath("//button[contains(., 'Request reimbursement')]")),
                st("report-issue-link", S::xpath("//a[contains(., 'Report an issue')]")),
            ],
            category: vec![
                st("category-select", S::css("select[name=\"category\"]")),
                st("category-id", S::css("#claim-category")),
            ],
            amount: vec![
                st("amount-name", S::css("input[name=\"amount\"]")),
                st("amount-id", S::css("#claim-amount")),
                st("amount-number", S::xpath("//input[@type='number']")),
            ],
            description: vec![
                st("description-name", S::css("textarea[name=\"description\"]")),
                st("description-id", S::css("#claim-description")),
                st("any-textarea", S::css("textarea")),
            ],
            location: vec![
                st("location-name", S::css("input[name=\"location\"]")),
                st("location-id", S::css("#claim-location")),
            ],
            evidence_input: vec![
                st("file-input", S::css("input[type=\"file\"]")),
            ],
            submit: vec![
                st("submit-button", S::css("button[type=\"submit\"]")),
                st("submit-text", S::xpath("//button[contains(., 'Submit')]")),
            ],
        }
    }
}

/// [`ClaimPortal`] built from prioritized selector strategies over a
/// [`PageDriver`].
pub struct StrategyPortal<D: PageDriver> {
    driver: D,
    base_url: String,
    profile: SelectorProfile,
    /// Rounds over a strategy list before a target is declared missing
    polls: u32,
    poll_interval: Duration,
    /// Pause after submit before the response text is read
    settle: Duration,
}

impl<D: PageDriver> StrategyPortal<D> {
    pub fn new(driver: D, base_url: impl Into<String>) -> Self {
        Self {
            driver,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            profile: SelectorProfile::default(),
            polls: 3,
            poll_interval: Duration::from_millis(500),
            settle: Duration::from_secs(1),
        }
    }

    pub fn with_profile(mut self, profile: SelectorProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_polling(mut self, polls: u32, interval: Duration) -> Self {
        self.polls = polls.max(1);
        self.poll_interval = interval;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// First strategy whose selector is present, polling a few rounds
    async fn first_present(
        &mut self,
        strategies: &[Strategy],
        trip_id: Option<&str>,
    ) -> Result<Option<Strategy>, PortalError> {
        for round in 0..self.polls {
            if round > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
            for strategy in strategies {
                let selector = match trip_id {
                    Some(id) => strategy.selector.with_trip(id),
                    None => strategy.selector.clone(),
                };
                if self.driver.exists(&selector).await? {
                    tracing::debug!("Strategy {} matched", strategy.name);
                    return Ok(Some(Strategy::new(strategy.name, selector)));
                }
            }
        }
        Ok(None)
    }

    async fn require(
        &mut self,
        strategies: &[Strategy],
        what: &str,
    ) -> Result<Strategy, PortalError> {
        self.first_present(strategies, None)
            .await?
            .ok_or_else(|| PortalError::ElementMissing(what.to_string()))
    }

    async fn open_trip(&mut self, trip_id: &str) -> Result<Located, PortalError> {
        let trip_loaded = self.profile.trip_loaded.clone();

        // 1. Direct link
        let direct = self.url(&self.profile.trip_path.replace("{trip_id}", trip_id));
        self.driver.goto(&direct).await?;
        if self.first_present(&trip_loaded, None).await?.is_some() {
            return Ok(Located::by("direct-link"));
        }

        // 2. Search the trips list
        tracing::info!("Trip {} not reachable by direct link, searching trip list", trip_id);
        let list = self.url(&self.profile.trips_list_path);
        self.driver.goto(&list).await?;
        let links = self.profile.trip_link.clone();
        if let Some(link) = self.first_present(&links, Some(trip_id)).await? {
            self.driver.click(&link.selector).await?;
            if self.first_present(&trip_loaded, None).await?.is_some() {
                return Ok(Located::by(format!("list-search:{}", link.name)));
            }
        }

        Err(PortalError::Unavailable(format!("trip {trip_id}")))
    }

    fn field_strategies(&self, field: ClaimField) -> Vec<Strategy> {
        match field {
            ClaimField::Category => self.profile.category.clone(),
            ClaimField::Amount => self.profile.amount.clone(),
            ClaimField::Description => self.profile.description.clone(),
            ClaimField::Location => self.profile.location.clone(),
        }
    }
}

#[async_trait]
impl<D: PageDriver> ClaimPortal for StrategyPortal<D> {
    async fn establish_session(&mut self, credentials: &Credentials) -> Result<(), PortalError> {
        let login = self.url(&self.profile.login_path);
        self.driver.goto(&login).await?;

        let identifier = self.profile.login_identifier.clone();
        let secret = self.profile.login_secret.clone();
        let submit = self.profile.login_submit.clone();
        let logged_in = self.profile.logged_in.clone();

        let field = self.require(&identifier, "login identifier field").await?;
        self.driver.type_text(&field.selector, &credentials.identifier).await?;
        let field = self.require(&secret, "login secret field").await?;
        self.driver.type_text(&field.selector, &credentials.secret).await?;
        let button = self.require(&submit, "login button").await?;
        self.driver.click(&button.selector).await?;

        match self.first_present(&logged_in, None).await? {
            Some(marker) => {
                tracing::info!("Signed in ({})", marker.name);
                tracing::debug!("Session account: {}", credentials.identifier);
                Ok(())
            }
            None => Err(PortalError::Session(
                "sign-in did not reach the dashboard".to_string(),
            )),
        }
    }

    async fn locate(&mut self, target: &Target) -> Result<Located, PortalError> {
        match target {
            Target::TripPage { trip_id } => self.open_trip(trip_id).await,
            Target::ClaimEntry => {
                let entry = self.profile.claim_entry.clone();
                match self.first_present(&entry, None).await? {
                    Some(found) => {
                        self.driver.click(&found.selector).await?;
                        Ok(Located::by(found.name))
                    }
                    None => Err(PortalError::Unavailable(target.to_string())),
                }
            }
        }
    }

    async fn fill(&mut self, field: ClaimField, value: &str) -> Result<Located, PortalError> {
        let strategies = self.field_strategies(field);
        let found = self.require(&strategies, &format!("{field} field")).await?;
        self.driver.type_text(&found.selector, value).await?;
        Ok(Located::by(found.name))
    }

    async fn upload(&mut self, path: &Path) -> Result<Located, PortalError> {
        let strategies = self.profile.evidence_input.clone();
        let found = self.require(&strategies, "evidence upload input").await?;
        self.driver.attach_file(&found.selector, path).await?;
        Ok(Located::by(found.name))
    }

    async fn submit(&mut self) -> Result<String, PortalError> {
        let strategies = self.profile.submit.clone();
        let found = self.require(&strategies, "submit button").await?;
        self.driver.click(&found.selector).await?;
        tokio::time::sleep(self.settle).await;
        self.driver.body_text().await
    }

    async fn snapshot(&mut self, dest: &Path) -> Result<(), PortalError> {
        let png = self.driver.screenshot().await?;
        tokio::fs::write(dest, png)
            .await
            .map_err(|e| PortalError::Network(format!("writing {}: {e}", dest.display())))
    }
}
