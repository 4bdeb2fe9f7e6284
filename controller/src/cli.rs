use std::{io::Write as _, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

use radiostat_common::{Config, LedColor};

use crate::{
    location::{LatitudeProvider, OAuthClient},
    run::{self, Authorizer, NoPrompt},
    store::Store,
    tstat::{MessageArea, Thermostat, TstatClient},
};

/// Sets a Radio Thermostat to its home or away temperature depending on
/// whether any tracked user is near home.
#[derive(Debug, Parser)]
#[command(name = "radiostat", version)]
pub struct Cli {
    /// Log informational messages to stdout.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding `config` and cached credentials
    /// [default: $HOME/.radiothermostat].
    #[arg(long, env = "RADIOSTAT_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Fail instead of prompting when a user needs to authorize location access.
    #[arg(long, global = true)]
    pub no_prompt: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check presence and adjust the thermostat (the default).
    Run,
    /// Grant location access for one user interactively.
    Authorize { user: String },
    /// Print the thermostat's current state.
    Status,
    /// Set the energy LED color (off, green, orange, red).
    Led { color: LedColor },
    /// Show a message on the thermostat display.
    Message {
        #[arg(value_enum)]
        area: Area,
        line: u8,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Area {
    /// User message area.
    Uma,
    /// Price message area.
    Pma,
}

impl From<Area> for MessageArea {
    fn from(area: Area) -> Self {
        match area {
            Area::Uma => MessageArea::Uma,
            Area::Pma => MessageArea::Pma,
        }
    }
}

/// Prompts on the terminal and stores the resulting credentials.
pub struct ConsoleAuthorizer<'a, R = BufReader<Stdin>> {
    oauth: &'a OAuthClient,
    store: &'a Store,
    // Shared across prompts so buffered codes for later users are not lost.
    input: Lines<R>,
}

impl<'a> ConsoleAuthorizer<'a> {
    pub fn new(oauth: &'a OAuthClient, store: &'a Store) -> Self {
        Self::with_input(oauth, store, BufReader::new(tokio::io::stdin()))
    }
}

impl<'a, R: AsyncBufRead + Unpin> ConsoleAuthorizer<'a, R> {
    pub fn with_input(oauth: &'a OAuthClient, store: &'a Store, input: R) -> Self {
        Self {
            oauth,
            store,
            input: input.lines(),
        }
    }

    async fn read_code(&mut self, user: &str) -> anyhow::Result<String> {
        let line = self
            .input
            .next_line()
            .await
            .context("failed to read authorization code")?
            .unwrap_or_default();
        let code = line.trim();
        if code.is_empty() {
            bail!("no authorization code entered for {user}");
        }
        Ok(code.to_string())
    }
}

impl<R: AsyncBufRead + Unpin> Authorizer for ConsoleAuthorizer<'_, R> {
    async fn authorize(&mut self, user: &str) -> anyhow::Result<()> {
        let url = self.oauth.authorization_url(user)?;
        println!("Logging in for {user}. You may want to log out of google in your browser.");
        println!("Open this URL and grant access:\n\n    {url}\n");
        print!("Authorization code: ");
        std::io::stdout().flush().ok();

        let code = self.read_code(user).await?;
        let credentials = self.oauth.exchange_code(&code).await?;
        self.store.save_credentials(user, &credentials).await?;
        info!("stored credentials for {user}");
        Ok(())
    }
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let store = Store::resolve(cli.config_dir)?;
    let config = store.load_config().await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let provider = LatitudeProvider::new(&config, store)?;
            let tstat = thermostat(&config)?;
            let outcome = if cli.no_prompt {
                run::run(&config, &provider, &tstat, &mut NoPrompt).await?
            } else {
                let mut authorizer = ConsoleAuthorizer::new(provider.oauth(), provider.store());
                run::run(&config, &provider, &tstat, &mut authorizer).await?
            };
            let located = outcome.distances.values().flatten().count();
            info!(
                "{located}/{} users located, anyone home: {}, action: {:?}",
                outcome.distances.len(),
                outcome.in_range,
                outcome.decision.action
            );
        }
        Command::Authorize { user } => {
            if !config.users.contains_key(&user) {
                bail!("{user} is not listed in {}", store.config_path().display());
            }
            let provider = LatitudeProvider::new(&config, store)?;
            ConsoleAuthorizer::new(provider.oauth(), provider.store())
                .authorize(&user)
                .await?;
        }
        Command::Status => {
            let state = thermostat(&config)?.state().await?;
            println!("mode: {}", state.mode.as_str());
            if let Some(temp) = state.temp {
                println!("temp: {temp}");
            }
            if let Some(t_heat) = state.t_heat {
                println!("t_heat: {t_heat}");
            }
            if let Some(t_cool) = state.t_cool {
                println!("t_cool: {t_cool}");
            }
        }
        Command::Led { color } => thermostat(&config)?.set_led(color).await?,
        Command::Message { area, line, text } => {
            thermostat(&config)?
                .message(area.into(), line, &text)
                .await?
        }
    }

    Ok(())
}

fn thermostat(config: &Config) -> anyhow::Result<TstatClient> {
    let client = TstatClient::new(
        &config.tstat_url,
        Duration::from_secs(config.http_timeout_secs),
    )?;
    debug!("thermostat at {}", client.root());
    Ok(client)
}
