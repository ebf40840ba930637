// src/main.rs
use clap::Parser;
use kube_connect::auth::CredentialSecret;
use kube_connect::cert::CertificateInfo;
use kube_connect::kubeconfig::{locate, DEFAULT_SERVICE_ACCOUNT_PATH};
use kube_connect::transport::TrustPolicy;
use kube_connect::utils::{ConsoleLogger, FileLogger, MultiLogger, SharedLogger};
use kube_connect::{
    ClientSettings, ConnectionOptions, KubeConfig, KubeError, PodEnvironment, Resolver,
    TransportBinder,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kube-connect", about = "Resolve a kubeconfig context and check its credentials")]
pub struct Args {
    /// Kubeconfig file; defaults to $KUBECONFIG, then ~/.kube/config
    #[arg(short, long)]
    pub kubeconfig: Option<String>,
    #[arg(short, long)]
    pub context: Option<String>,
    #[arg(short, long)]
    pub namespace: Option<String>,
    /// Client settings (JSON)
    #[arg(short, long)]
    pub settings: Option<String>,
    #[arg(short, long)]
    pub debug: bool,
    #[arg(long)]
    pub log_file: Option<String>,
    /// Also obtain a credential, running credential plugins if needed
    #[arg(long)]
    pub fetch_credential: bool,
    /// Use the pod's service account instead of a kubeconfig
    #[arg(long)]
    pub in_cluster: bool,
}

fn build_logger(args: &Args) -> kube_connect::Result<SharedLogger> {
    let mut logger = MultiLogger::new().add(Arc::new(ConsoleLogger::new(args.debug)));
    if let Some(path) = &args.log_file {
        let file_logger =
            FileLogger::new(path, args.debug).map_err(|e| KubeError::config_load(path.clone(), e))?;
        logger = logger.add(Arc::new(file_logger));
    }
    Ok(Arc::new(logger))
}

fn kubeconfig_path(args: &Args) -> kube_connect::Result<PathBuf> {
    if let Some(path) = &args.kubeconfig {
        return Ok(PathBuf::from(path));
    }
    if let Some(paths) = std::env::var_os("KUBECONFIG") {
        if let Some(first) = std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
            return Ok(first);
        }
    }
    locate().ok_or_else(|| {
        KubeError::config_load("~/.kube/config", "cannot determine the home directory")
    })
}

fn connection_options(
    args: &Args,
    settings: ClientSettings,
    logger: SharedLogger,
) -> kube_connect::Result<ConnectionOptions> {
    if args.in_cluster {
        logger.debug_log(&format!(
            "Using service account at {}",
            DEFAULT_SERVICE_ACCOUNT_PATH
        ));
        let mut options = ConnectionOptions::from_pod_service_account(
            &PodEnvironment::from_process_env(),
            DEFAULT_SERVICE_ACCOUNT_PATH,
        )?;
        if let Some(namespace) = &args.namespace {
            options.namespace = namespace.clone();
        }
        options.log_headers = settings.log_headers;
        options.credential_wait = settings.credential_wait();
        return Ok(options);
    }

    let path = kubeconfig_path(args)?;
    logger.debug_log(&format!("Loading kubeconfig from {}", path.display()));
    let config = KubeConfig::load_from_file(&path)?;

    Resolver::new(settings)
        .with_logger(logger)
        .resolve(&config, args.context.as_deref(), args.namespace.as_deref())
}

fn print_certificate(label: &str, info: &CertificateInfo) {
    println!("{}:", label);
    println!("  Subject:     {}", info.subject);
    println!("  Issuer:      {}", info.issuer);
    println!("  Not after:   {}", info.not_after.to_rfc3339());
    println!("  Fingerprint: {}", info.fingerprint);
}

fn print_summary(options: &ConnectionOptions) -> kube_connect::Result<()> {
    println!("Endpoint:  {}", options.endpoint);
    println!("Namespace: {}", options.namespace);
    println!("Auth:      {}", options.auth_strategy.kind());

    match options.trust_policy() {
        TrustPolicy::PlatformRoots => println!("TLS:       platform roots"),
        TrustPolicy::Insecure => println!("TLS:       INSECURE (server certificate not verified)"),
        TrustPolicy::CustomCa(ca) => {
            println!("TLS:       cluster CA");
            print_certificate("Cluster CA", &CertificateInfo::from_x509(&ca)?);
        }
    }

    if let Some(certificate) = &options.client_certificate {
        print_certificate(
            "Client certificate",
            &CertificateInfo::from_x509(certificate.certificate())?,
        );
    }
    Ok(())
}

async fn run(args: Args) -> kube_connect::Result<()> {
    let logger = build_logger(&args)?;

    let settings = match &args.settings {
        Some(path) => ClientSettings::load_from_file(path)?,
        None => ClientSettings::default(),
    };

    let options = connection_options(&args, settings, Arc::clone(&logger))?;
    print_summary(&options)?;

    if args.fetch_credential {
        let binder = TransportBinder::new(options)?.with_logger(logger);
        match binder.current_credential().await? {
            None => println!("Credential: none"),
            Some(credential) => {
                let kind = match &credential.secret {
                    CredentialSecret::BearerToken(_) => "bearer token",
                    CredentialSecret::Basic { .. } => "basic",
                    CredentialSecret::ClientCertificate(_) => "client certificate",
                };
                let expiry = credential
                    .expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("Credential: {} (expires: {})", kind, expiry);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
