use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pkg_constants::controller::{AWSSECRET_API_VERSION, AWSSECRET_KIND};
use pkg_constants::paths::DEFAULT_API_ENDPOINT;
use pkg_types::awssecret::{AwsSecret, AwsSecretManifest};
use pkg_types::secret::Secret;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "awssecretctl", about = "CLI tool for managing AWSSecrets")]
struct Cli {
    /// Operator API endpoint
    #[arg(long, default_value = DEFAULT_API_ENDPOINT)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update an AWSSecret from a manifest file
    Apply {
        /// Path to a YAML manifest
        #[arg(short, long)]
        file: String,
    },
    /// Show one AWSSecret
    Get {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// List AWSSecrets
    List {
        /// Namespace to list; all namespaces when omitted
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// Delete an AWSSecret and the Secret it owns
    Delete {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Inspect Secrets
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Print a Secret with its data decoded
    Get {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self.http.get(self.url(path)).send().await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(resp: Response) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("server returned {}: {}", status, body.trim())
}

fn load_manifest(path: &str) -> anyhow::Result<AwsSecretManifest> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let manifest: AwsSecretManifest =
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path))?;
    if let Some(kind) = manifest.kind.as_deref().filter(|k| *k != AWSSECRET_KIND) {
        bail!("unsupported kind '{}', expected {}", kind, AWSSECRET_KIND);
    }
    if let Some(api_version) = manifest
        .api_version
        .as_deref()
        .filter(|v| *v != AWSSECRET_API_VERSION)
    {
        warn!(
            "apiVersion '{}' differs from {}, applying anyway",
            api_version, AWSSECRET_API_VERSION
        );
    }
    Ok(manifest)
}

fn print_awssecrets(decls: &[AwsSecret]) {
    println!(
        "{:<16} {:<24} {:<32} {:<8} {}",
        "NAMESPACE", "NAME", "SECRET ID", "VERSION", "CREATED"
    );
    for decl in decls {
        let string_ref = &decl.spec.string_data_from.secrets_manager_secret_ref;
        let data_ref = &decl.spec.data_from.secrets_manager_secret_ref;
        let secret_id = if string_ref.secret_id.is_empty() {
            &data_ref.secret_id
        } else {
            &string_ref.secret_id
        };
        println!(
            "{:<16} {:<24} {:<32} {:<8} {}",
            decl.namespace,
            decl.name,
            secret_id,
            decl.resource_version,
            decl.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if decls.is_empty() {
        println!("(no awssecrets found)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let client = ApiClient {
        http: reqwest::Client::new(),
        base: cli.server.clone(),
    };

    match &cli.command {
        Commands::Apply { file } => {
            let manifest = load_manifest(file)?;
            let path = format!(
                "/apis/v1alpha1/namespaces/{}/awssecrets/{}",
                manifest.metadata.namespace, manifest.metadata.name
            );
            info!("Applying {} to {}", file, cli.server);
            let resp = client
                .http
                .put(client.url(&path))
                .json(&manifest.spec)
                .send()
                .await?;
            let resp = check(resp).await?;
            let verb = if resp.status() == StatusCode::CREATED {
                "created"
            } else {
                "configured"
            };
            let decl: AwsSecret = resp.json().await?;
            println!("awssecret/{} {}", decl.name, verb);
        }
        Commands::Get { name, namespace } => {
            let decl: AwsSecret = client
                .get(&format!(
                    "/apis/v1alpha1/namespaces/{}/awssecrets/{}",
                    namespace, name
                ))
                .await?;
            let manifest = AwsSecretManifest {
                api_version: Some(AWSSECRET_API_VERSION.to_string()),
                kind: Some(AWSSECRET_KIND.to_string()),
                metadata: pkg_types::awssecret::ManifestMeta {
                    name: decl.name,
                    namespace: decl.namespace,
                },
                spec: decl.spec,
            };
            print!("{}", serde_yaml::to_string(&manifest)?);
        }
        Commands::List { namespace } => {
            let path = match namespace {
                Some(ns) => format!("/apis/v1alpha1/namespaces/{}/awssecrets", ns),
                None => "/apis/v1alpha1/awssecrets".to_string(),
            };
            let decls: Vec<AwsSecret> = client.get(&path).await?;
            print_awssecrets(&decls);
        }
        Commands::Delete { name, namespace } => {
            let path = format!(
                "/apis/v1alpha1/namespaces/{}/awssecrets/{}",
                namespace, name
            );
            let resp = client.http.delete(client.url(&path)).send().await?;
            check(resp).await?;
            println!("awssecret/{} deleted", name);
        }
        Commands::Secret { action } => match action {
            SecretAction::Get { name, namespace } => {
                let secret: Secret = client
                    .get(&format!("/api/v1/namespaces/{}/secrets/{}", namespace, name))
                    .await?;
                println!("Name:       {}", secret.name);
                println!("Namespace:  {}", secret.namespace);
                println!("Type:       {}", secret.secret_type);
                if let Some(owner) = &secret.owner_ref {
                    println!("Owner:      {}/{}", owner.kind, owner.name);
                }
                for (title, map) in [("Labels", &secret.labels), ("Annotations", &secret.annotations)] {
                    if let Some(map) = map.as_ref().filter(|m| !m.is_empty()) {
                        println!("{}:", title);
                        for (k, v) in map {
                            println!("  {}={}", k, v);
                        }
                    }
                }
                println!("Data:");
                for (k, v) in &secret.data {
                    println!("  {}: {}", k, String::from_utf8_lossy(v));
                }
            }
        },
    }

    Ok(())
}
