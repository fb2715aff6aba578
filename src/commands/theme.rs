use colorizer_lib::output::{ThemeOutput, OUTPUT_VERSION};
use colorizer_lib::{ColorizerOutput, Result, Theme};

use super::CommandEnv;
use crate::cli::ThemeAction;

/// Shows the current theme, or changes and persists it.
pub fn run(env: &CommandEnv, action: Option<ThemeAction>) -> Result<ColorizerOutput> {
    let theme = match action {
        None => env.app.theme(),
        Some(action) => {
            let theme = match action {
                ThemeAction::Toggle => env.app.toggle_theme(),
                ThemeAction::Light => set(env, Theme::Light),
                ThemeAction::Dark => set(env, Theme::Dark),
            };
            env.persist()?;
            tracing::debug!(?theme, "theme updated");
            theme
        }
    };
    Ok(ColorizerOutput::Theme(ThemeOutput {
        version: OUTPUT_VERSION.to_string(),
        theme,
    }))
}

fn set(env: &CommandEnv, theme: Theme) -> Theme {
    env.app.set_theme(theme);
    theme
}
