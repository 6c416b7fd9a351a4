//! The reservation bot job.
//!
//! Books a restaurant slot up to the point where a human has to take over:
//! the bot logs in, searches availability for the target date, holds a slot,
//! fills in guest details, and stops at the payment hand-off. Reaching the
//! hand-off is the job's success criterion; payment itself is deliberately
//! manual.
//!
//! The flow is an explicit state machine so a failure is attributable to a
//! specific state, and every transition is guarded by its own timeout. The
//! session itself is behind [`ReservationSession`]; production uses the HTTP
//! implementation, tests script their own.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::job::{Job, JobContext, JobError};
use crate::core::retry::RetryPolicy;

/// Default number of guests.
const DEFAULT_PARTY_SIZE: u32 = 2;

/// Preferred seating time.
const DEFAULT_SEATING: &str = "19:30";

/// Bound on each state transition.
const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// States of the booking flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Login,
    Search,
    SelectSlot,
    FillDetails,
    AwaitHandoff,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BotState::Login => "login",
            BotState::Search => "search",
            BotState::SelectSlot => "select_slot",
            BotState::FillDetails => "fill_details",
            BotState::AwaitHandoff => "await_handoff",
        };
        write!(f, "{}", name)
    }
}

/// One bookable slot returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Seating time, `HH:MM`.
    pub time: String,
    /// Opaque hold token for this slot.
    pub token: String,
}

/// Guest details filled in before the hand-off.
#[derive(Debug, Clone, Serialize)]
pub struct GuestDetails {
    pub phone: String,
}

/// Account credentials for the booking site.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub phone: String,
}

impl Credentials {
    /// Read credentials from `TOCK_EMAIL`, `TOCK_PASSWORD`, `TOCK_PHONE`.
    /// A missing variable is an attempt failure, so a later retry can pick
    /// up a fixed environment.
    pub fn from_env() -> Result<Self, JobError> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| JobError::MissingEnv(name.to_string()))
        };
        Ok(Self {
            email: var("TOCK_EMAIL")?,
            password: var("TOCK_PASSWORD")?,
            phone: var("TOCK_PHONE")?,
        })
    }
}

/// The remote booking session the bot drives.
#[async_trait]
pub trait ReservationSession: Send + Sync {
    /// Authenticate the account.
    async fn login(&self, email: &str, password: &str) -> Result<(), JobError>;

    /// Search availability for a date and party size.
    async fn search(&self, date: NaiveDate, party_size: u32) -> Result<Vec<Slot>, JobError>;

    /// Place a hold on a slot.
    async fn select_slot(&self, slot: &Slot) -> Result<(), JobError>;

    /// Fill in guest details for the held slot.
    async fn fill_details(&self, details: &GuestDetails) -> Result<(), JobError>;

    /// Confirm the booking is parked at the manual payment step.
    async fn await_handoff(&self) -> Result<(), JobError>;
}

/// Last Friday of the month after the given date's month.
///
/// The bot targets the booking window that typically opens one month out.
pub fn last_friday_of_next_month(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    // Walk back from the first of the following month.
    let mut day = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("valid calendar date")
        .pred_opt()
        .expect("valid calendar date");
    while day.weekday() != Weekday::Fri {
        day = day.pred_opt().expect("valid calendar date");
    }
    day
}

/// The reservation bot.
pub struct ReservationJob {
    session: Arc<dyn ReservationSession>,
    credentials: Option<Credentials>,
    party_size: u32,
    seating: String,
    step_timeout: Duration,
}

impl ReservationJob {
    /// Bot over the given session, credentials from the environment at run
    /// time.
    pub fn with_session(session: Arc<dyn ReservationSession>) -> Self {
        Self {
            session,
            credentials: None,
            party_size: DEFAULT_PARTY_SIZE,
            seating: DEFAULT_SEATING.to_string(),
            step_timeout: STEP_TIMEOUT,
        }
    }

    /// Use fixed credentials instead of the environment.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Change the per-state timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Change the default party size.
    pub fn with_party_size(mut self, party_size: u32) -> Self {
        self.party_size = party_size;
        self
    }

    /// Change the preferred seating time.
    pub fn with_seating(mut self, seating: impl Into<String>) -> Self {
        self.seating = seating.into();
        self
    }

    /// Run a state's work under the per-state timeout, attributing a
    /// timeout to that state.
    async fn bounded<T, F>(&self, state: BotState, fut: F) -> Result<T, JobError>
    where
        F: std::future::Future<Output = Result<T, JobError>>,
    {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(JobError::Timeout {
                step: state.to_string(),
                timeout: self.step_timeout,
            }),
        }
    }
}

#[async_trait]
impl Job for ReservationJob {
    fn name(&self) -> &str {
        "reservation"
    }

    fn description(&self) -> Option<&str> {
        Some("book a slot and park at the manual payment hand-off")
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let credentials = match &self.credentials {
            Some(c) => c.clone(),
            None => Credentials::from_env()?,
        };
        let party_size = ctx.param("party_size").unwrap_or(self.party_size);
        let seating: String = ctx.param("time").unwrap_or_else(|| self.seating.clone());
        let target = last_friday_of_next_month(Utc::now().date_naive());

        info!(
            date = %target,
            party_size,
            seating = %seating,
            "Starting reservation flow"
        );

        let mut state = BotState::Login;
        let mut held: Option<Slot> = None;
        loop {
            state = match state {
                BotState::Login => {
                    self.bounded(state, self.session.login(&credentials.email, &credentials.password))
                        .await?;
                    BotState::Search
                }
                BotState::Search => {
                    let slots = self
                        .bounded(state, self.session.search(target, party_size))
                        .await?;
                    let slot = slots
                        .iter()
                        .find(|s| s.time == seating)
                        .or_else(|| slots.first())
                        .cloned()
                        .ok_or_else(|| {
                            JobError::Failed(format!("no slots available on {}", target))
                        })?;
                    info!(slot = %slot.time, "Found a slot");
                    held = Some(slot);
                    BotState::SelectSlot
                }
                BotState::SelectSlot => {
                    let slot = held
                        .as_ref()
                        .ok_or_else(|| JobError::Failed("no slot held".to_string()))?;
                    self.bounded(state, self.session.select_slot(slot)).await?;
                    BotState::FillDetails
                }
                BotState::FillDetails => {
                    let details = GuestDetails {
                        phone: credentials.phone.clone(),
                    };
                    self.bounded(state, self.session.fill_details(&details))
                        .await?;
                    BotState::AwaitHandoff
                }
                BotState::AwaitHandoff => {
                    self.bounded(state, self.session.await_handoff()).await?;
                    info!("Reached payment hand-off, finish the booking manually");
                    return Ok(());
                }
            };
        }
    }
}

/// HTTP implementation of the booking session.
pub struct HttpReservationSession {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReservationSession {
    /// Session against the given site.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(STEP_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Default for HttpReservationSession {
    fn default() -> Self {
        Self::new("https://www.exploretock.com")
    }
}

fn session_err(err: reqwest::Error) -> JobError {
    JobError::Session(err.to_string())
}

#[async_trait]
impl ReservationSession for HttpReservationSession {
    async fn login(&self, email: &str, password: &str) -> Result<(), JobError> {
        self.client
            .post(self.url("/api/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?;
        Ok(())
    }

    async fn search(&self, date: NaiveDate, party_size: u32) -> Result<Vec<Slot>, JobError> {
        let slots = self
            .client
            .get(self.url("/api/availability"))
            .query(&[
                ("date", date.to_string()),
                ("size", party_size.to_string()),
            ])
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?
            .json::<Vec<Slot>>()
            .await
            .map_err(session_err)?;
        Ok(slots)
    }

    async fn select_slot(&self, slot: &Slot) -> Result<(), JobError> {
        self.client
            .post(self.url("/api/reservations/hold"))
            .json(&serde_json::json!({ "token": slot.token }))
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?;
        Ok(())
    }

    async fn fill_details(&self, details: &GuestDetails) -> Result<(), JobError> {
        self.client
            .post(self.url("/api/reservations/details"))
            .json(details)
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?;
        Ok(())
    }

    async fn await_handoff(&self) -> Result<(), JobError> {
        #[derive(Deserialize)]
        struct StatusResponse {
            state: String,
        }

        let status = self
            .client
            .get(self.url("/api/reservations/status"))
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?
            .json::<StatusResponse>()
            .await
            .map_err(session_err)?;

        if status.state == "pending_payment" {
            Ok(())
        } else {
            Err(JobError::Session(format!(
                "expected pending_payment, reservation is {}",
                status.state
            )))
        }
    }
}
