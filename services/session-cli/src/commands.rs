//! Argument parsing and command execution

use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{
    ApiRequest, AuthApi, CallbackParams, Dispatcher, ReqwestTransport, SessionClient, Transport,
};
use common::Secret;
use credential_store::{CredentialStore, FileStore, KeyValueStore, Preferences, Theme, is_locale_tag};
use session::{HydrationGate, HydrationReport, SessionContainer, hydrate};
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tracing::info;

use crate::callback::{self, CALLBACK_PATH};
use crate::config::Config;
use crate::error::Error;
use crate::navigator::TerminalNavigator;

pub const USAGE: &str = "\
usage: tourism-session [--config <path>] [--metrics] <command>

commands:
  status                 show the restored session
  login <email>          sign in (password from TOURISM_PASSWORD or stdin)
  oauth                  sign in through the identity provider
  whoami                 fetch the signed-in profile
  get <path>             authenticated GET against the API
  theme <light|dark|system>
  locale <tag>
  logout                 end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Login { email: String },
    OAuth,
    WhoAmI,
    Get { path: String },
    Theme(Theme),
    Locale(String),
    Logout,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub metrics: bool,
    pub command: Command,
}

/// Parse arguments (without the program name).
pub fn parse_args(args: &[String]) -> std::result::Result<Invocation, Error> {
    let mut config_path = None;
    let mut metrics = false;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| Error::Usage("--config needs a path".into()))?;
                config_path = Some(path.clone());
            }
            "--metrics" => metrics = true,
            flag if flag.starts_with("--") => {
                return Err(Error::Usage(format!("unknown flag: {flag}")));
            }
            _ => positional.push(arg.as_str()),
        }
    }

    let command = match positional.as_slice() {
        [] | ["status"] => Command::Status,
        ["login", email] => Command::Login {
            email: (*email).to_string(),
        },
        ["oauth"] => Command::OAuth,
        ["whoami"] => Command::WhoAmI,
        ["get", path] => Command::Get {
            path: (*path).to_string(),
        },
        ["theme", value] => Command::Theme(
            Theme::parse(value).ok_or_else(|| Error::Usage(format!("unknown theme: {value}")))?,
        ),
        ["locale", tag] if is_locale_tag(tag) => Command::Locale((*tag).to_string()),
        ["locale", tag] => return Err(Error::Usage(format!("invalid locale tag: {tag}"))),
        ["logout"] => Command::Logout,
        other => return Err(Error::Usage(format!("unrecognised command: {}", other.join(" ")))),
    };

    Ok(Invocation {
        config_path,
        metrics,
        command,
    })
}

/// Everything a command needs, wired once at startup.
pub struct App {
    config: Config,
    session: Arc<SessionContainer>,
    gate: HydrationGate,
    client: Arc<SessionClient>,
    auth: AuthApi,
    navigator: Arc<TerminalNavigator>,
}

impl App {
    pub async fn build(config: Config, command: &Command) -> Result<Self> {
        let backend = FileStore::open(config.storage.path.clone())
            .await
            .with_context(|| format!("opening credential file {}", config.storage.path.display()))?;
        let session = Arc::new(SessionContainer::new(CredentialStore::new(Arc::new(backend))));

        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
            reqwest::Client::new(),
            &config.api.base_url,
            config.request_timeout(),
        )?);
        info!(transport = transport.id(), base_url = %config.api.base_url, "transport ready");

        let current = match command {
            Command::Get { path } => Some(path.clone()),
            _ => None,
        };
        let navigator = Arc::new(TerminalNavigator::new(current));
        let client = Arc::new(SessionClient::new(
            Dispatcher::new(transport, session.clone()),
            navigator.clone(),
        ));

        Ok(Self {
            config,
            session,
            gate: HydrationGate::new(),
            auth: AuthApi::new(client.clone()),
            client,
            navigator,
        })
    }

    pub async fn hydrate(&self) -> Option<HydrationReport> {
        hydrate(&self.session, &self.gate).await
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        self.gate.wait_hydrated().await;
        match command {
            Command::Status => self.status().await,
            Command::Login { email } => self.login(&email).await,
            Command::OAuth => self.oauth().await,
            Command::WhoAmI => self.whoami().await,
            Command::Get { path } => self.get(&path).await,
            Command::Theme(theme) => self.update_preferences(|p| p.theme = theme).await,
            Command::Locale(locale) => self.update_preferences(|p| p.locale = locale).await,
            Command::Logout => self.logout().await,
        }
    }

    fn backend(&self) -> &dyn KeyValueStore {
        self.session.store().backend().as_ref()
    }

    async fn status(&self) -> Result<()> {
        let state = self.session.snapshot();
        let preferences = Preferences::load(self.backend()).await;
        let user = state.user.as_ref();
        let report = serde_json::json!({
            "view": format!("{:?}", self.gate.view(&state)),
            "phase": state.phase.label(),
            "authenticated": state.is_authenticated(),
            "needsProfileCompletion": state.needs_profile_completion(),
            "user": user.map(|u| serde_json::json!({
                "id": u.id,
                "email": u.email,
                "role": u.role,
            })),
            "theme": preferences.theme.as_str(),
            "locale": preferences.locale,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    async fn login(&self, email: &str) -> Result<()> {
        let password = read_password().await?;
        let signed_in = self
            .auth
            .login(email, &password, None)
            .await
            .context("sign-in failed")?;
        println!("Signed in as {} ({})", display_name(&signed_in.user), signed_in.user.role);
        println!("next: {}", signed_in.landing);
        Ok(())
    }

    async fn oauth(&self) -> Result<()> {
        let oauth = &self.config.oauth;
        let listener = TcpListener::bind(oauth.listen_addr)
            .await
            .with_context(|| format!("binding callback listener on {}", oauth.listen_addr))?;
        let redirect_uri = format!("http://{}{CALLBACK_PATH}", listener.local_addr()?);

        let state = callback::generate_state();
        let url = callback::provider_url(&self.config.api.base_url, &oauth.provider_path, &redirect_uri, &state)?;
        eprintln!("Open this address in a browser to sign in:\n\n  {url}\n");

        let params: CallbackParams =
            callback::wait_for_callback(listener, &state, self.config.callback_timeout()).await?;
        let next = self
            .auth
            .handle_callback(params)
            .await
            .context("completing provider sign-in")?;

        let state = self.session.snapshot();
        if let Some(user) = &state.user {
            println!("Signed in as {} ({})", display_name(user), user.role);
        }
        println!("next: {next}");
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            return Err(Error::NotSignedIn.into());
        }
        let user = self.auth.fetch_profile().await.context("fetching profile")?;
        println!("{}", serde_json::to_string_pretty(&user)?);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<()> {
        let response = match self.client.execute(ApiRequest::get(path)).await {
            Ok(response) => response,
            Err(e) => {
                if let Some(target) = self.navigator.last_redirect() {
                    info!(target_path = %target, "redirected to sign-in");
                }
                return Err(anyhow::Error::new(e).context(format!("GET {path} failed")));
            }
        };
        match serde_json::from_slice::<serde_json::Value>(&response.body) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{}", String::from_utf8_lossy(&response.body)),
        }
        Ok(())
    }

    async fn update_preferences(&self, change: impl FnOnce(&mut Preferences)) -> Result<()> {
        let mut preferences = Preferences::load(self.backend()).await;
        change(&mut preferences);
        preferences
            .save(self.backend())
            .await
            .context("saving preferences")?;
        println!(
            "theme: {}, locale: {}",
            preferences.theme.as_str(),
            preferences.locale
        );
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.auth.logout().await.context("signing out")?;
        println!("Signed out.");
        Ok(())
    }
}

fn display_name(user: &credential_store::UserProfile) -> &str {
    user.name
        .as_deref()
        .or(user.email.as_deref())
        .unwrap_or(&user.id)
}

/// `TOURISM_PASSWORD`, else the first line of stdin.
async fn read_password() -> Result<Secret<String>> {
    if let Ok(password) = std::env::var("TOURISM_PASSWORD") {
        return Ok(Secret::new(password));
    }
    eprint!("Password: ");
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("reading password from stdin")?;
    let password = Secret::new(line.trim_end_matches(['\r', '\n']).to_string());
    line.clear();
    if password.is_blank() {
        return Err(Error::Usage("password must not be empty".into()).into());
    }
    Ok(password)
}
