use std::collections::BTreeMap;

use tracing::{info, warn};

use radiostat_common::{
    decide, distance_miles, Config, Decision, DecisionReason, Error, PresenceReport, Verdict,
};

use crate::{
    location::{LocateError, LocationFix, LocationProvider},
    tstat::Thermostat,
};

/// Invoked when a user's location credentials are missing or revoked.
pub trait Authorizer {
    /// Returns once `user` has been authorized; the lookup is retried once.
    async fn authorize(&mut self, user: &str) -> anyhow::Result<()>;
}

/// Fails the run instead of prompting.
pub struct NoPrompt;

impl Authorizer for NoPrompt {
    async fn authorize(&mut self, user: &str) -> anyhow::Result<()> {
        Err(Error::AuthorizationRequired {
            user: user.to_string(),
        }
        .into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub distances: BTreeMap<String, Option<f64>>,
    pub in_range: bool,
    pub decision: Decision,
}

/// One presence pass: locate users, read the device, maybe write a setpoint.
pub async fn run<L, T, A>(
    config: &Config,
    locator: &L,
    thermostat: &T,
    authorizer: &mut A,
) -> anyhow::Result<RunOutcome>
where
    L: LocationProvider,
    T: Thermostat,
    A: Authorizer,
{
    let distances = locate_users(config, locator, authorizer).await?;

    let report = PresenceReport::new(&distances, config.min_range_miles);
    for (user, verdict) in report.verdicts() {
        match verdict {
            Verdict::InRange(_) => info!("{user} in range"),
            Verdict::OutOfRange(miles) => info!("{user} out of range: {miles:.0} mi"),
            Verdict::Unknown => {}
        }
    }

    let state = thermostat.state().await?;
    // Refuse an idle device before touching its program.
    state.mode.setpoint_field()?;

    let program = thermostat.program(state.mode, &config.program_day).await?;
    let schedule = program.day(&config.program_day)?;
    let decision = decide(report.in_range(), &state, &schedule)?;

    if decision.is_write() {
        thermostat
            .set_setpoint(decision.field, decision.target_temp)
            .await?;
    }
    log_decision(&decision);

    Ok(RunOutcome {
        distances,
        in_range: report.in_range(),
        decision,
    })
}

async fn locate_users<L, A>(
    config: &Config,
    locator: &L,
    authorizer: &mut A,
) -> anyhow::Result<BTreeMap<String, Option<f64>>>
where
    L: LocationProvider,
    A: Authorizer,
{
    let home = config.home();
    let mut distances = BTreeMap::new();

    for user in config.users() {
        let result = match locator.locate(user).await {
            Err(LocateError::AuthorizationRequired(_)) => {
                authorizer.authorize(user).await?;
                locator.locate(user).await
            }
            other => other,
        };

        let distance = match result {
            Ok(LocationFix::Fix(position)) => Some(distance_miles(home, position)),
            Ok(LocationFix::NoData) => {
                warn!("No location data for {user}");
                None
            }
            Err(LocateError::Timeout) => {
                warn!("Location request for {user} timed out");
                None
            }
            Err(LocateError::AuthorizationRequired(user)) => {
                return Err(Error::AuthorizationRequired { user }.into());
            }
            Err(LocateError::Connection(message)) => {
                return Err(Error::Connection(message).into());
            }
            Err(LocateError::Parse(message)) => return Err(Error::Parse(message).into()),
        };

        distances.insert(user.to_string(), distance);
    }

    Ok(distances)
}

fn log_decision(decision: &Decision) {
    let temp = decision.target_temp;
    match decision.reason {
        DecisionReason::Away => info!("Set A/C to away temp: {temp}"),
        DecisionReason::RaiseToHome
        | DecisionReason::LowerToHome
        | DecisionReason::SetpointUnknown => info!("Set A/C to home temp: {temp}"),
        DecisionReason::AlreadySet => info!("Thermostat temp is already set"),
        DecisionReason::AlreadyLower => info!("Thermostat temp is already lower"),
        DecisionReason::AlreadyHigher => info!("Thermostat temp is already higher"),
    }
}
