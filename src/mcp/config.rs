use std::{collections::BTreeMap, fmt};

/// Key under which the OAuth client id is handed to the spawned server.
pub const OAUTH_CLIENT_ID_KEY: &str = "GOOGLE_OAUTH_CLIENT_ID";
/// Key under which the OAuth client secret is handed to the spawned server.
pub const OAUTH_CLIENT_SECRET_KEY: &str = "GOOGLE_OAUTH_CLIENT_SECRET";

/// Which transport a client run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Child process speaking MCP over stdin/stdout.
    Stdio,
    /// Remote server reached over streamable HTTP.
    StreamableHttp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::StreamableHttp => f.write_str("streamable HTTP"),
        }
    }
}

/// How to reach the MCP tool server. Built once per run, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub enum McpServerEntry {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    StreamableHttp {
        url: String,
        bearer_token: Option<String>,
    },
}

impl McpServerEntry {
    /// Build a stdio entry.
    ///
    /// `ambient` is the environment the child inherits; the two OAuth keys
    /// are layered on top of it and win over any ambient value.
    pub fn stdio<I>(
        command: impl Into<String>,
        args_line: &str,
        ambient: I,
        client_id: &str,
        client_secret: &str,
    ) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env: BTreeMap<String, String> = ambient.into_iter().collect();
        env.insert(OAUTH_CLIENT_ID_KEY.to_string(), client_id.to_string());
        env.insert(OAUTH_CLIENT_SECRET_KEY.to_string(), client_secret.to_string());

        Self::Stdio {
            command: command.into(),
            args: split_args(args_line),
            env,
        }
    }

    pub fn streamable_http(url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self::StreamableHttp {
            url: url.into(),
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            Self::Stdio { .. } => Transport::Stdio,
            Self::StreamableHttp { .. } => Transport::StreamableHttp,
        }
    }

    /// Value of the `Authorization` header sent to a remote server, if any.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Self::StreamableHttp {
                bearer_token: Some(token),
                ..
            } => Some(format!("Bearer {token}")),
            _ => None,
        }
    }
}

// Secrets travel inside `env` and `bearer_token`; keep them out of logs.
impl fmt::Debug for McpServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio { command, args, env } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("env_keys", &env.len())
                .finish(),
            Self::StreamableHttp { url, bearer_token } => f
                .debug_struct("StreamableHttp")
                .field("url", url)
                .field("bearer_token", &bearer_token.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Split an argument line on whitespace. No quoting rules apply.
pub fn split_args(line: &str) -> Vec<String> {
    line.split_whitespace().map(ToString::to_string).collect()
}
