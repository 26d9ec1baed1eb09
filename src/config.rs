//! Environment-driven configuration.
//!
//! Every required variable is checked before anything is spawned or
//! dialed; the first missing one is reported by name.

use crate::llm::LlmSettings;
use crate::mcp::McpServerEntry;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_SERVER_COMMAND: &str = "uvx";
pub const DEFAULT_SERVER_ARGS: &str = "workspace-mcp --tool-tier core";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000/mcp";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Model used by the agent
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Dotenv file to load before reading the environment
    #[arg(long, env = "DOTENV_PATH")]
    pub env_file: Option<PathBuf>,
}

impl Cli {
    /// Seed the process environment from a dotenv file. A missing default
    /// `.env` is fine; an explicitly named file that cannot be read is not.
    pub fn load_dotenv(&self) -> Result<(), ConfigError> {
        match &self.env_file {
            Some(path) => dotenvy::from_path(path).map_err(|e| ConfigError::Dotenv {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
            None => {
                let _ = dotenvy::dotenv();
                Ok(())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Set {0} before running this client.")]
    MissingVar(&'static str),

    #[error(
        "Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET so the MCP server can authenticate with Google ({0} is missing)."
    )]
    MissingOAuth(&'static str),

    #[error("MCP_SERVER_URL must be an http(s) URL, got '{0}'")]
    InvalidUrl(String),

    #[error("could not load {path}: {message}")]
    Dotenv { path: String, message: String },
}

/// Where configuration values come from.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Every variable, for handing down to a child process.
    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        // Non-UTF-8 entries cannot be represented in the descriptor; skip them.
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Everything one client run needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub llm: LlmSettings,
    pub server: McpServerEntry,
}

fn required(env: &impl EnvSource, key: &'static str) -> Result<String, ConfigError> {
    env.get(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(key))
}

fn optional(env: &impl EnvSource, key: &str) -> Option<String> {
    env.get(key).filter(|v| !v.trim().is_empty())
}

fn llm_settings(env: &impl EnvSource, cli: &Cli) -> Result<LlmSettings, ConfigError> {
    let api_key = required(env, "OPENAI_API_KEY")?;

    // Values seeded from a dotenv file land after argument parsing, so the
    // env source is consulted again.
    let model = cli
        .model
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| optional(env, "OPENAI_MODEL"))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let base_url = cli
        .base_url
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| optional(env, "OPENAI_BASE_URL"))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    Ok(LlmSettings {
        base_url,
        api_key: Some(api_key),
        model,
    })
}

/// Configuration for the stdio client.
///
/// The child inherits the whole environment plus the two OAuth keys.
pub fn load_stdio_config(env: &impl EnvSource, cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let llm = llm_settings(env, cli)?;

    let client_id = optional(env, "GOOGLE_CLIENT_ID")
        .ok_or(ConfigError::MissingOAuth("GOOGLE_CLIENT_ID"))?;
    let client_secret = optional(env, "GOOGLE_CLIENT_SECRET")
        .ok_or(ConfigError::MissingOAuth("GOOGLE_CLIENT_SECRET"))?;

    let command =
        optional(env, "MCP_SERVER_COMMAND").unwrap_or_else(|| DEFAULT_SERVER_COMMAND.to_string());
    let args_line = env
        .get("MCP_SERVER_ARGS")
        .unwrap_or_else(|| DEFAULT_SERVER_ARGS.to_string());

    // An explicitly empty argument line launches the bare command.
    let server = McpServerEntry::stdio(command, &args_line, env.vars(), &client_id, &client_secret);
    Ok(ClientConfig { llm, server })
}

/// Configuration for the streamable HTTP client.
pub fn load_http_config(env: &impl EnvSource, cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let llm = llm_settings(env, cli)?;

    let url = optional(env, "MCP_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    match url::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => return Err(ConfigError::InvalidUrl(url)),
    }

    let server = McpServerEntry::streamable_http(url, optional(env, "MCP_BEARER_TOKEN"));
    Ok(ClientConfig { llm, server })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::config::{OAUTH_CLIENT_ID_KEY, OAUTH_CLIENT_SECRET_KEY};

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn stdio_env() -> HashMap<String, String> {
        env(&[
            ("OPENAI_API_KEY", "x"),
            ("GOOGLE_CLIENT_ID", "a"),
            ("GOOGLE_CLIENT_SECRET", "b"),
        ])
    }

    #[test]
    fn test_stdio_defaults() {
        let cfg = load_stdio_config(&stdio_env(), &Cli::default()).unwrap();

        let McpServerEntry::Stdio { command, args, .. } = &cfg.server else {
            panic!("expected stdio entry");
        };
        assert_eq!(command, "uvx");
        assert_eq!(args, &vec!["workspace-mcp", "--tool-tier", "core"]);
        assert_eq!(cfg.llm.model, DEFAULT_MODEL);
        assert_eq!(cfg.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.llm.api_key.as_deref(), Some("x"));
    }

    #[test]
    fn test_stdio_env_is_ambient_plus_oauth_keys() {
        let mut vars = stdio_env();
        vars.insert("HOME".into(), "/home/me".into());
        vars.insert("MCP_SERVER_ARGS".into(), "  my-server   --port 9  ".into());
        vars.insert("MCP_SERVER_COMMAND".into(), "python".into());

        let cfg = load_stdio_config(&vars, &Cli::default()).unwrap();
        let McpServerEntry::Stdio { command, args, env } = &cfg.server else {
            panic!("expected stdio entry");
        };

        assert_eq!(command, "python");
        assert_eq!(args, &vec!["my-server", "--port", "9"]);
        for (k, v) in &vars {
            assert_eq!(env.get(k), Some(v), "ambient {k} not inherited");
        }
        assert_eq!(env.len(), vars.len() + 2);
        assert_eq!(env[OAUTH_CLIENT_ID_KEY], "a");
        assert_eq!(env[OAUTH_CLIENT_SECRET_KEY], "b");
    }

    #[test]
    fn test_stdio_each_missing_required_var_fails() {
        for missing in ["OPENAI_API_KEY", "GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"] {
            let mut vars = stdio_env();
            vars.remove(missing);
            let err = load_stdio_config(&vars, &Cli::default()).unwrap_err();
            assert!(err.to_string().contains(missing), "{missing}: {err}");

            // blank counts as missing
            vars.insert(missing.into(), "  ".into());
            assert!(load_stdio_config(&vars, &Cli::default()).is_err());
        }
    }

    #[test]
    fn test_api_key_checked_first() {
        let err = load_stdio_config(&HashMap::new(), &Cli::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("OPENAI_API_KEY")));
        assert_eq!(err.to_string(), "Set OPENAI_API_KEY before running this client.");
    }

    #[test]
    fn test_empty_server_args_launch_bare_command() {
        let mut vars = stdio_env();
        vars.insert("MCP_SERVER_ARGS".into(), String::new());
        vars.insert("MCP_SERVER_COMMAND".into(), "workspace-mcp".into());

        let cfg = load_stdio_config(&vars, &Cli::default()).unwrap();
        let McpServerEntry::Stdio { command, args, .. } = &cfg.server else {
            panic!("expected stdio entry");
        };
        assert_eq!(command, "workspace-mcp");
        assert!(args.is_empty());
    }

    #[test]
    fn test_http_defaults_without_token() {
        let cfg = load_http_config(&env(&[("OPENAI_API_KEY", "x")]), &Cli::default()).unwrap();
        assert_eq!(
            cfg.server,
            McpServerEntry::streamable_http(DEFAULT_SERVER_URL, None)
        );
        assert_eq!(cfg.server.authorization_header(), None);
    }

    #[test]
    fn test_http_with_token_and_url() {
        let vars = env(&[
            ("OPENAI_API_KEY", "x"),
            ("MCP_SERVER_URL", "https://mcp.example.com/mcp"),
            ("MCP_BEARER_TOKEN", "t0k"),
        ]);
        let cfg = load_http_config(&vars, &Cli::default()).unwrap();
        assert_eq!(cfg.server.authorization_header().as_deref(), Some("Bearer t0k"));
        assert!(matches!(
            &cfg.server,
            McpServerEntry::StreamableHttp { url, .. } if url == "https://mcp.example.com/mcp"
        ));
    }

    #[test]
    fn test_http_requires_api_key_and_valid_url() {
        assert!(matches!(
            load_http_config(&HashMap::new(), &Cli::default()),
            Err(ConfigError::MissingVar("OPENAI_API_KEY"))
        ));

        let vars = env(&[("OPENAI_API_KEY", "x"), ("MCP_SERVER_URL", "localhost:8000")]);
        assert!(matches!(
            load_http_config(&vars, &Cli::default()),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_cli_overrides_model_env() {
        let mut vars = stdio_env();
        vars.insert("OPENAI_MODEL".into(), "gpt-4o".into());

        let from_env = load_stdio_config(&vars, &Cli::default()).unwrap();
        assert_eq!(from_env.llm.model, "gpt-4o");

        let cli = Cli::try_parse_from(["client", "--model", "o4-mini", "--base-url", "http://proxy"]).unwrap();
        let from_cli = load_stdio_config(&vars, &cli).unwrap();
        assert_eq!(from_cli.llm.model, "o4-mini");
        assert_eq!(from_cli.llm.base_url, "http://proxy");
    }
}
