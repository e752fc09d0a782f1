use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use idlink_common::observability::init_logging;
use idlink_config::{IdlinkConfig, IdlinkConfigLoader, default_config_path};
use idlink_http::{Auth, HttpClient};
use idlink_identity::IdentityResource;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Manage linked social network identities.
#[derive(Debug, Parser)]
#[command(name = "idlink", version)]
struct Cli {
    /// Config file (defaults to the platform config dir, `idlink/idlink.yaml`).
    #[arg(long, short, env = "IDLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh an identity from its social network profile.
    Synchronize { token: String },
    /// Show one identity.
    Get { token: String },
    /// List identities, one page at a time.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show the social network contacts of an identity.
    Contacts {
        token: String,
        /// Extra query option, repeatable (`--option disable_cache=true`).
        #[arg(long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },
    /// Delete an identity.
    Delete { token: String },
    /// Link an identity to another user.
    Relink {
        identity_token: String,
        user_token: String,
    },
}

fn load_config(explicit: Option<PathBuf>) -> Result<IdlinkConfig> {
    let loader = IdlinkConfigLoader::new();
    let loader = match explicit {
        Some(path) => loader.with_file(path),
        None => match default_config_path() {
            Some(path) => loader.with_optional_file(path),
            None => loader,
        },
    };
    loader.load().context("loading idlink configuration")
}

fn parse_options(raw: &[String]) -> Result<Map<String, Value>> {
    let mut options = Map::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("option `{pair}` is not KEY=VALUE");
        };
        options.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config)?;

    let log_path = init_logging(cfg.logging.to_log_config("idlink"))?;
    tracing::debug!(log_path = %log_path.display(), "idlink.start");

    let mut http = HttpClient::new(&cfg.api.base_url)?.with_auth(Auth::Basic {
        username: cfg.api.public_key.clone(),
        password: cfg.api.private_key.clone(),
    });
    if let Some(timeout) = cfg.api.timeout() {
        http = http.with_timeout(timeout);
    }
    let identities = IdentityResource::new(http);

    let data = match cli.command {
        Command::Synchronize { token } => identities.synchronize(&token).await?,
        Command::Get { token } => identities.get(&token).await?,
        Command::List { page } => identities.get_all(page).await?,
        Command::Contacts { token, options } if options.is_empty() => {
            identities.get_contacts(&token).await?
        }
        Command::Contacts { token, options } => {
            identities
                .get_contacts_with(&token, parse_options(&options)?)
                .await?
        }
        Command::Delete { token } => identities.del(&token).await?,
        Command::Relink {
            identity_token,
            user_token,
        } => identities.re_link(&identity_token, &user_token).await?,
    };

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_contacts_options() {
        let cli = Cli::try_parse_from([
            "idlink",
            "contacts",
            "abc",
            "--option",
            "disable_cache=true",
        ])
        .unwrap();
        match cli.command {
            Command::Contacts { token, options } => {
                assert_eq!(token, "abc");
                let parsed = parse_options(&options).unwrap();
                assert_eq!(parsed["disable_cache"], "true");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn list_defaults_to_first_page() {
        let cli = Cli::try_parse_from(["idlink", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List { page: 1 }));
    }

    #[test]
    fn malformed_option_is_rejected() {
        assert!(parse_options(&["nope".to_string()]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
