use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::schema::{schema_from_fields, schema_from_map};
use crate::llm_client::{AgentConfig, DEFAULT_API_VERSION, DEFAULT_TIMEOUT};

/// Application configuration loaded from environment variables.
///
/// This is the only place the process environment is read. Missing Azure
/// credentials are reported when the agent validates its config.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent: AgentConfig,
    pub chat_schema: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let mut agent = AgentConfig::default()
            .with_key(env_or_empty("AZURE_OPENAI_KEY"))
            .with_endpoint(env_or_empty("AZURE_OPENAI_ENDPOINT"))
            .with_model(env_or_empty("AZURE_OPENAI_MODEL"))
            .with_api_version(
                optional_env("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            );
        if let Some(deployment) = optional_env("AZURE_OPENAI_DEPLOYMENT") {
            agent = agent.with_deployment(deployment);
        }
        agent = agent.with_timeout(match optional_env("AZURE_OPENAI_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .context("AZURE_OPENAI_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => DEFAULT_TIMEOUT,
        });

        Ok(Config {
            agent,
            chat_schema: chat_schema_from_env()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8888".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// `CHAT_OUTPUT_SCHEMA` wins; otherwise the schema is built from
/// `CHAT_SCHEMA_FIELDS` / `CHAT_SCHEMA_REQUIRED`.
fn chat_schema_from_env() -> Result<Option<String>> {
    if let Some(schema) = optional_env("CHAT_OUTPUT_SCHEMA") {
        serde_json::from_str::<serde_json::Value>(&schema)
            .context("CHAT_OUTPUT_SCHEMA must be valid JSON")?;
        return Ok(Some(schema));
    }

    let Some(fields) = optional_env("CHAT_SCHEMA_FIELDS") else {
        return Ok(None);
    };
    let required = optional_env("CHAT_SCHEMA_REQUIRED").unwrap_or_default();
    build_chat_schema(&fields, &required).map(Some)
}

/// Builds a schema from `path:type[=default]` pairs separated by commas,
/// e.g. `author.name:text,author.age:int`.
fn build_chat_schema(fields: &str, required: &str) -> Result<String> {
    let props = parse_field_specs(fields)?;
    let required: Vec<&str> = split_list(required).collect();
    let schema = if required.is_empty() {
        schema_from_map(props)
    } else {
        schema_from_fields(props, &required)
    };
    schema.context("failed to serialize chat schema")
}

fn parse_field_specs(fields: &str) -> Result<Vec<(String, String)>> {
    split_list(fields)
        .map(|entry| {
            let (path, spec) = entry.split_once(':').unwrap_or((entry, ""));
            let path = path.trim();
            anyhow::ensure!(!path.is_empty(), "empty field path in CHAT_SCHEMA_FIELDS entry '{entry}'");
            Ok((path.to_string(), spec.trim().to_string()))
        })
        .collect()
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or_empty(key: &str) -> String {
    optional_env(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_parse_field_specs() {
        let specs = parse_field_specs(" author.name:text , author.age:int=30,,title").unwrap();
        assert_eq!(
            specs,
            vec![
                ("author.name".to_string(), "text".to_string()),
                ("author.age".to_string(), "int=30".to_string()),
                ("title".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_field_specs_rejects_empty_path() {
        assert!(parse_field_specs(":int").is_err());
    }

    #[test]
    fn test_build_chat_schema() {
        let schema = build_chat_schema("author.name:text,author.age:int", "author.name").unwrap();
        let value: Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(value["properties"]["author"]["properties"]["age"]["type"], "integer");
        assert_eq!(value["properties"]["author"]["required"], json!(["name"]));
    }
}
