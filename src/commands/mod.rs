mod account;
mod colorize;
mod images;
mod theme;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colorizer_lib::{
    AppContext, AuthError, ColorizerError, ColorizerOutput, Config, Credentials,
    FirebaseIdentityClient, IdentityService, Result, SessionStore, UserSession,
};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::formatting::{finish, render_error};
use crate::settings::load_config;

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub config_path: Option<PathBuf>,
    pub verbose: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Loaded configuration plus the persisted application state.
pub struct CommandEnv {
    pub globals: Globals,
    pub config: Config,
    pub credentials: Credentials,
    pub app: AppContext,
    store: SessionStore,
}

impl CommandEnv {
    pub fn load(globals: Globals) -> Result<Self> {
        let config = load_config(globals.config_path.as_deref())?;
        let store = SessionStore::new(&config.paths.state_dir());
        let state = store.load()?;
        tracing::debug!(path = %store.path().display(), "loaded app state");
        Ok(Self {
            globals,
            config,
            credentials: Credentials::from_env(),
            app: AppContext::new(state),
            store,
        })
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.globals.config_path.as_deref()
    }

    pub fn persist(&self) -> Result<()> {
        self.store.save(&self.app.snapshot())
    }

    pub fn identity(&self) -> Result<FirebaseIdentityClient> {
        FirebaseIdentityClient::from_config(&self.config, &self.credentials)
    }

    /// The signed-in session, refreshed first when its token has gone stale.
    pub async fn active_session(&self) -> Result<UserSession> {
        let session = self.app.require_session()?;
        if !session.is_expired() {
            return Ok(session);
        }

        tracing::debug!(user_id = %session.user_id, "refreshing expired session");
        match self.identity()?.refresh(&session).await {
            Ok(refreshed) => {
                self.app.set_session(Some(refreshed.clone()));
                self.persist()?;
                Ok(refreshed)
            }
            Err(AuthError::SessionExpired) => {
                colorizer_lib::identity::sign_out(&self.app);
                self.persist()?;
                Err(AuthError::SessionExpired.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn run(cli: Cli) -> ExitCode {
    let globals = Globals {
        config_path: cli.config,
        verbose: cli.verbose,
        format: cli.format,
        output: cli.output,
    };
    let format = globals.format;
    let output = globals.output.clone();

    let env = match CommandEnv::load(globals) {
        Ok(env) => env,
        Err(err) => return render_error(err, format, output),
    };

    match dispatch(&env, cli.command).await {
        Ok(Some(body)) => finish(body, format, output),
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => render_error(err, format, output),
    }
}

/// `Ok(None)` means the command already wrote its own output.
async fn dispatch(env: &CommandEnv, command: Commands) -> Result<Option<ColorizerOutput>> {
    let body = match command {
        Commands::SignUp {
            first_name,
            last_name,
            email,
            password,
        } => account::sign_up(env, first_name, last_name, email, password).await?,
        Commands::SignIn { email, password } => account::sign_in(env, email, password).await?,
        Commands::SignOut => account::sign_out(env)?,
        Commands::ResetPassword { email } => account::reset_password(env, email).await?,
        Commands::Whoami => account::whoami(env),
        Commands::Colorize {
            input,
            source,
            save,
            colorize_timeout,
        } => colorize::run(env, input, source, save, colorize_timeout).await?,
        Commands::Images { watch: false } => images::list(env).await?,
        Commands::Images { watch: true } => {
            images::watch(env).await?;
            return Ok(None);
        }
        Commands::Delete { key } => images::delete(env, key).await?,
        Commands::Save { url, name } => images::save(env, url, name).await?,
        Commands::Theme { action } => theme::run(env, action)?,
    };
    Ok(Some(body))
}

fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeouts.http)
        .build()
        .map_err(|e| ColorizerError::config(format!("Failed to build HTTP client: {e}")))
}
