#![forbid(unsafe_code)]

use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flagkit_client::{ClientConfig, FlagClient};
use flagkit_core::flag::context::ENVIRONMENT_KEY;
use flagkit_core::{EvaluationContext, FeatureFlag};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

const CONFIG_DIR: &str = ".flagkit";
const CONFIG_PATH: &str = ".flagkit/config.json";

#[derive(Parser)]
#[command(
    name = "flagkit",
    version,
    about = "Evaluate, check, and scaffold feature flags. Unix-friendly."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Evaluate a flag definition against a context. Exits 1 when the flag is off.
    Eval {
        /// Path to flag .json (or "-" / omit for stdin).
        #[arg(default_value = "-")]
        file: String,

        /// Environment to evaluate in (overrides the context file).
        #[arg(long)]
        env: Option<String>,

        /// Context attribute, KEY=VALUE. VALUE is parsed as JSON, else taken as a string.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// JSON file with the base context.
        #[arg(long)]
        context: Option<String>,

        /// Output structured JSON.
        #[arg(long)]
        json: bool,
    },

    /// Schema validation plus rule lint.
    Check {
        /// Path to flag .json file.
        file: String,

        /// Output structured JSON report.
        #[arg(long)]
        json: bool,

        /// Fail on warnings (not just errors).
        #[arg(long)]
        strict: bool,
    },

    /// Create a new flag from a built-in template.
    New {
        /// Template name: kill-switch, beta, rollout, pro-tier.
        template: String,

        /// Set the flag name.
        #[arg(long)]
        name: Option<String>,

        /// Write to file instead of stdout.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List available built-in templates.
    Templates,

    /// Summarize flag files in a directory as a table.
    List {
        /// Directory containing .json flag files.
        #[arg(default_value = ".")]
        dir: String,
    },

    /// Show the rollout hash and bucket for a key.
    Hash {
        /// Key to hash (usually a user id).
        key: String,

        /// Rollout seed.
        #[arg(long, default_value = "0")]
        seed: String,
    },

    /// Batch-evaluate flags against the remote evaluation endpoint.
    Remote {
        /// Flag names.
        #[arg(required = true)]
        names: Vec<String>,

        /// Client config file.
        #[arg(long, default_value = CONFIG_PATH)]
        config: String,

        /// Environment (overrides config).
        #[arg(long)]
        env: Option<String>,

        /// Context attribute, KEY=VALUE.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Write a default client config to .flagkit/config.json.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Eval {
            file,
            env,
            set,
            context,
            json,
        } => cmd_eval(&file, env.as_deref(), &set, context.as_deref(), json),

        Cmd::Check { file, json, strict } => cmd_check(&file, json, strict),

        Cmd::New {
            template,
            name,
            output,
        } => cmd_new(&template, name.as_deref(), output.as_deref()),

        Cmd::Templates => cmd_templates(),

        Cmd::List { dir } => cmd_list(&dir),

        Cmd::Hash { key, seed } => cmd_hash(&key, &seed),

        Cmd::Remote {
            names,
            config,
            env,
            set,
        } => cmd_remote(&names, &config, env.as_deref(), &set),

        Cmd::Init { force } => cmd_init(force),
    }
}

fn read_flag(file: &str) -> Result<FeatureFlag> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        serde_json::from_str(&buf).context("stdin: invalid flag definition")
    } else {
        flagkit_core::schema::load_flag(file)
    }
}

/// Parse `KEY=VALUE`. The value is JSON when it parses, otherwise a string.
fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid --set \"{raw}\": expected KEY=VALUE");
    };
    if key.is_empty() {
        bail!("invalid --set \"{raw}\": empty key");
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn assignments(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs.iter().map(|raw| parse_assignment(raw)).collect()
}

fn build_context(
    env: Option<&str>,
    pairs: &[String],
    context_file: Option<&str>,
) -> Result<EvaluationContext> {
    let mut attributes = match context_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {path}"))?;
            match serde_json::from_str::<Value>(&content)
                .with_context(|| format!("{path}: invalid JSON"))?
            {
                Value::Object(map) => map,
                _ => bail!("{path}: context must be a JSON object"),
            }
        }
        None => Map::new(),
    };
    attributes.extend(assignments(pairs)?);
    if let Some(env) = env {
        attributes.insert(ENVIRONMENT_KEY.into(), Value::String(env.to_string()));
    }
    if !attributes.contains_key(ENVIRONMENT_KEY) {
        bail!("no environment: pass --env or set \"environment\" in the context");
    }
    serde_json::from_value(Value::Object(attributes)).context("invalid context")
}

fn cmd_eval(
    file: &str,
    env: Option<&str>,
    pairs: &[String],
    context_file: Option<&str>,
    json_out: bool,
) -> Result<()> {
    let flag = read_flag(file)?;
    let context = build_context(env, pairs, context_file)?;
    let evaluation = flagkit_engine::explain_flag(&flag, &context);
    tracing::debug!(flag = %flag.name, reason = ?evaluation.reason, "evaluated");

    if json_out {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        let state = if evaluation.enabled { "on" } else { "off" };
        let reason = serde_json::to_value(evaluation.reason)?;
        println!(
            "{} [{}]: {state} ({})",
            evaluation.flag,
            evaluation.environment,
            reason.as_str().unwrap_or_default()
        );
    }

    if !evaluation.enabled {
        bail!("flag {} is off", evaluation.flag);
    }
    Ok(())
}

fn cmd_check(file: &str, json_out: bool, strict: bool) -> Result<()> {
    let content =
        std::fs::read_to_string(file).map_err(|e| anyhow::anyhow!("cannot read {file}: {e}"))?;
    let data: Value =
        serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("{file}: invalid JSON: {e}"))?;

    let report = flagkit_core::schema::check(&data, file, strict);

    if json_out {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let name = report.flag.as_deref().unwrap_or("?");
        if report.pass {
            eprintln!("  ok  {file} ({name})");
        } else {
            eprintln!("  FAIL {file} ({name})");
        }
        for e in &report.errors {
            eprintln!(
                "  error {}: {} {}",
                e.code,
                e.message,
                e.path.as_deref().unwrap_or("")
            );
        }
        for w in &report.warnings {
            eprintln!(
                "  warn  {}: {} {}",
                w.code,
                w.message,
                w.path.as_deref().unwrap_or("")
            );
        }
    }

    if !report.pass {
        bail!("check failed for {file}");
    }
    Ok(())
}

fn cmd_new(template: &str, name: Option<&str>, output: Option<&str>) -> Result<()> {
    let flag = flagkit_core::templates::generate(template, name).ok_or_else(|| {
        let available: Vec<_> = flagkit_core::templates::list_templates()
            .iter()
            .map(|(n, _)| *n)
            .collect();
        anyhow::anyhow!(
            "unknown template \"{template}\". available: {}",
            available.join(", ")
        )
    })?;

    let json = serde_json::to_string_pretty(&flag)?;

    if let Some(path) = output {
        std::fs::write(path, &json)?;
        eprintln!("wrote {path}");
    } else {
        println!("{json}");
    }
    Ok(())
}

fn cmd_templates() -> Result<()> {
    for (name, desc) in flagkit_core::templates::list_templates() {
        println!("  {name:<12} {desc}");
    }
    Ok(())
}

fn cmd_list(dir: &str) -> Result<()> {
    let rows = flagkit_core::list::scan_dir(dir)?;
    flagkit_core::list::print_table(&rows);
    Ok(())
}

fn cmd_hash(key: &str, seed: &str) -> Result<()> {
    let seed = flagkit_engine::hash::parse_seed(seed);
    let hash = flagkit_engine::hash::murmur3_32(key, seed);
    let bucket = flagkit_engine::hash::bucket(key, seed);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "key": key,
            "seed": seed,
            "hash": hash,
            "bucket": bucket,
        }))?
    );
    Ok(())
}

fn cmd_remote(names: &[String], config_path: &str, env: Option<&str>, pairs: &[String]) -> Result<()> {
    let mut config = ClientConfig::load_or_default(config_path)?.with_env_overrides();
    if let Some(env) = env {
        config.environment = env.to_string();
    }
    let partial = assignments(pairs)?;

    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    let results = runtime.block_on(async {
        let client = FlagClient::from_config(&config)?;
        client.set_context(partial);
        anyhow::Ok(client.evaluate_flags(names).await)
    })?;

    let ordered: Map<String, Value> = names
        .iter()
        .map(|name| {
            let enabled = results.get(name).copied().unwrap_or(false);
            (name.clone(), Value::Bool(enabled))
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&ordered)?);
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    if Path::new(CONFIG_PATH).exists() && !force {
        bail!("{CONFIG_PATH} already exists (use --force to overwrite)");
    }
    std::fs::create_dir_all(CONFIG_DIR)?;
    let json = serde_json::to_string_pretty(&ClientConfig::default())?;
    std::fs::write(CONFIG_PATH, &json)?;
    eprintln!("created {CONFIG_PATH}");
    Ok(())
}
