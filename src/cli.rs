use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "colorizer")]
#[command(
    version,
    about = "Colorizer - bring old black-and-white photos to color",
    long_about = "Colorizer\n\nSign in, pick or capture a photo, and have it colorized by a hosted model. Every result is kept in your image collection and can be listed, saved locally or deleted.\n\nCredentials come from COLORIZER_AUTH_API_KEY and COLORIZER_MODEL_API_KEY.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for endpoints, timeouts, paths and permissions; CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, global = true, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and sign in
    SignUp {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long, help = "At least 8 characters")]
        password: String,
    },

    /// Sign in with e-mail and password
    SignIn {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Forget the stored session
    SignOut,

    /// Send a password reset e-mail
    ResetPassword {
        #[arg(long)]
        email: String,
    },

    /// Show the signed-in user
    Whoami,

    /// Colorize a photo and add it to your images
    Colorize {
        #[arg(
            long,
            value_name = "PATH",
            help = "Image file to use; prompts for a path when omitted (empty answer cancels)"
        )]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "library", help = "Where the photo comes from")]
        source: PhotoSource,

        #[arg(long, help = "Also save the colorized image to the local gallery")]
        save: bool,

        #[arg(
            long,
            value_name = "SECS",
            help = "Deadline for the colorization model (seconds); overrides timeouts.colorize"
        )]
        colorize_timeout: Option<u64>,
    },

    /// List your colorized images
    Images {
        #[arg(long, help = "Keep running and print the list again after every change")]
        watch: bool,
    },

    /// Delete one image record by key
    Delete {
        // Push keys start with '-'.
        #[arg(long, allow_hyphen_values = true, help = "Record key as printed by `images`")]
        key: String,
    },

    /// Download an image into the local documents folder and gallery
    Save {
        #[arg(long)]
        url: String,

        #[arg(long, help = "File name without extension (usually the image id)")]
        name: String,
    },

    /// Show or change the color theme
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeAction>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PhotoSource {
    Library,
    Camera,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ThemeAction {
    Toggle,
    Light,
    Dark,
}

#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, OutputFormat, PhotoSource, ThemeAction};
    use clap::Parser;

    #[test]
    fn colorize_command_uses_defaults() {
        let cli = Cli::parse_from(["colorizer", "colorize", "--input", "/tmp/a.jpg"]);

        assert!(!cli.verbose);
        assert!(cli.config.is_none());
        assert!(matches!(cli.format, OutputFormat::Json));

        match cli.command {
            Commands::Colorize {
                input,
                source,
                save,
                colorize_timeout,
            } => {
                assert_eq!(input.as_deref(), Some(std::path::Path::new("/tmp/a.jpg")));
                assert_eq!(source, PhotoSource::Library);
                assert!(!save);
                assert!(colorize_timeout.is_none());
            }
            _ => panic!("expected colorize command"),
        }
    }

    #[test]
    fn colorize_command_accepts_overrides() {
        let cli = Cli::parse_from([
            "colorizer",
            "colorize",
            "--source",
            "camera",
            "--save",
            "--colorize-timeout",
            "45",
            "--format",
            "pretty",
            "--config",
            "colorizer.toml",
        ]);

        assert!(matches!(cli.format, OutputFormat::Pretty));
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("colorizer.toml"))
        );
        match cli.command {
            Commands::Colorize {
                input,
                source,
                save,
                colorize_timeout,
            } => {
                assert!(input.is_none());
                assert_eq!(source, PhotoSource::Camera);
                assert!(save);
                assert_eq!(colorize_timeout, Some(45));
            }
            _ => panic!("expected colorize command"),
        }
    }

    #[test]
    fn sign_up_collects_every_field() {
        let cli = Cli::parse_from([
            "colorizer",
            "--verbose",
            "sign-up",
            "--first-name",
            "Ada",
            "--last-name",
            "Lovelace",
            "--email",
            "ada@example.com",
            "--password",
            "analytical",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::SignUp {
                first_name,
                last_name,
                email,
                password,
            } => {
                assert_eq!(first_name, "Ada");
                assert_eq!(last_name, "Lovelace");
                assert_eq!(email, "ada@example.com");
                assert_eq!(password, "analytical");
            }
            _ => panic!("expected sign-up command"),
        }
    }

    #[test]
    fn theme_action_is_optional() {
        let cli = Cli::parse_from(["colorizer", "theme"]);
        assert!(matches!(cli.command, Commands::Theme { action: None }));
        let cli = Cli::parse_from(["colorizer", "theme", "toggle"]);
        assert!(matches!(
            cli.command,
            Commands::Theme {
                action: Some(ThemeAction::Toggle)
            }
        ));
    }

    #[test]
    fn images_watch_flag() {
        let cli = Cli::parse_from(["colorizer", "images", "--watch"]);
        assert!(matches!(cli.command, Commands::Images { watch: true }));
    }

    #[test]
    fn delete_accepts_push_keys_starting_with_a_dash() {
        let cli = Cli::parse_from(["colorizer", "delete", "--key", "-NxA1b2"]);
        match cli.command {
            Commands::Delete { key } => assert_eq!(key, "-NxA1b2"),
            _ => panic!("expected delete command"),
        }
    }
}
