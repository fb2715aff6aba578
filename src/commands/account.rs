use colorizer_lib::output::{AuthAction, AuthOutput, UserSummary, OUTPUT_VERSION};
use colorizer_lib::{
    ColorizerError, ColorizerOutput, IdentityService, LoginForm, PasswordResetForm,
    RegistrationForm, Result, SignInRequest, SignUpRequest, UserSession,
};

use super::CommandEnv;

const RESET_SENT_MESSAGE: &str = "Check your inbox for a link to reset your password.";

fn auth_output(action: AuthAction, user: Option<&UserSession>, message: Option<&str>) -> ColorizerOutput {
    ColorizerOutput::Auth(AuthOutput {
        version: OUTPUT_VERSION.to_string(),
        action,
        user: user.map(UserSummary::from),
        message: message.map(str::to_owned),
    })
}

pub async fn sign_up(
    env: &CommandEnv,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
) -> Result<ColorizerOutput> {
    let form = RegistrationForm {
        first_name,
        last_name,
        email,
        password,
    };
    form.validate().map_err(ColorizerError::Validation)?;

    let request = SignUpRequest {
        name: form.display_name(),
        email: form.email,
        password: form.password,
    };
    let session = env.identity()?.sign_up(&request).await?;
    env.app.set_session(Some(session.clone()));
    env.persist()?;
    Ok(auth_output(AuthAction::SignUp, Some(&session), None))
}

pub async fn sign_in(env: &CommandEnv, email: String, password: String) -> Result<ColorizerOutput> {
    let form = LoginForm { email, password };
    form.validate().map_err(ColorizerError::Validation)?;

    let request = SignInRequest {
        email: form.email,
        password: form.password,
    };
    let session = env.identity()?.sign_in(&request).await?;
    env.app.set_session(Some(session.clone()));
    env.persist()?;
    Ok(auth_output(AuthAction::SignIn, Some(&session), None))
}

pub fn sign_out(env: &CommandEnv) -> Result<ColorizerOutput> {
    colorizer_lib::identity::sign_out(&env.app);
    env.persist()?;
    Ok(auth_output(AuthAction::SignOut, None, Some("Signed out.")))
}

pub async fn reset_password(env: &CommandEnv, email: String) -> Result<ColorizerOutput> {
    let form = PasswordResetForm { email };
    form.validate().map_err(ColorizerError::Validation)?;

    env.identity()?.request_password_reset(&form.email).await?;
    Ok(auth_output(
        AuthAction::ResetPassword,
        None,
        Some(RESET_SENT_MESSAGE),
    ))
}

pub fn whoami(env: &CommandEnv) -> ColorizerOutput {
    match env.app.session() {
        Some(session) => auth_output(AuthAction::Whoami, Some(&session), None),
        None => auth_output(AuthAction::Whoami, None, Some("Not signed in.")),
    }
}
