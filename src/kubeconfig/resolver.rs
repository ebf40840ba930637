// src/kubeconfig/resolver.rs
use super::model::{is_set, ClusterConfig, ExecConfig, KubeConfig, UserConfig};
use crate::auth::{
    AuthProviderCommand, AuthStrategy, CommandRunner, ExecClusterInfo, ExecPlugin,
    RefreshableCredential, TokioCommandRunner,
};
use crate::cert::{load_certificate, load_client_certificate, MaterialSource};
use crate::config::ClientSettings;
use crate::error::{KubeError, Result};
use crate::options::ConnectionOptions;
use crate::utils::{null_logger, resolve_path, SharedLogger};
use base64::{engine::general_purpose, Engine as _};
use openssl::x509::X509;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Trust anchor of a cluster plus the base64 form plugins receive.
struct ClusterAuthority {
    certificate: X509,
    data: String,
}

/// Turns a kubeconfig context into validated [`ConnectionOptions`].
pub struct Resolver {
    settings: ClientSettings,
    runner: Arc<dyn CommandRunner>,
    logger: SharedLogger,
}

impl Resolver {
    pub fn new(settings: ClientSettings) -> Self {
        let runner = Arc::new(TokioCommandRunner::new(settings.exec_timeout()));
        Self {
            settings,
            runner,
            logger: null_logger(),
        }
    }

    /// Replaces the process launcher used by command-backed credentials.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn resolve(
        &self,
        config: &KubeConfig,
        context_name: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<ConnectionOptions> {
        self.settings.validate()?;

        // Names match exactly; only a blank name falls back to the current context.
        let context_name = context_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| config.current_context.as_deref())
            .filter(|name| !name.trim().is_empty())
            .ok_or(KubeError::NoContextSpecified)?;

        let context = config
            .find_context(context_name)
            .ok_or_else(|| KubeError::ContextNotFound(context_name.to_string()))?;
        let cluster = config
            .find_cluster(&context.context.cluster)
            .ok_or_else(|| KubeError::ClusterNotFound(context.context.cluster.clone()))?;
        let user = config
            .find_user(&context.context.user)
            .ok_or_else(|| KubeError::UserNotFound(context.context.user.clone()))?;

        let base_dir = config.source_dir.as_deref();
        let endpoint = parse_endpoint(&cluster.cluster.server)?;
        let authority = load_cluster_authority(&cluster.cluster, base_dir)?;

        let mut options = ConnectionOptions::new(endpoint);
        options.namespace = non_blank(namespace)
            .or_else(|| non_blank(context.context.namespace.as_deref()))
            .unwrap_or(&self.settings.default_namespace)
            .to_string();
        options.allow_insecure = cluster.cluster.insecure_skip_tls_verify;
        options.log_headers = self.settings.log_headers;
        options.credential_wait = self.settings.credential_wait();

        options.auth_strategy =
            self.build_strategy(&user.user, &cluster.cluster, authority.as_ref(), base_dir)?;
        if let AuthStrategy::ClientCertificate(certificate) = &options.auth_strategy {
            options.client_certificate = Some(certificate.clone());
        }
        options.ca_certificate = authority.map(|authority| authority.certificate);

        self.logger.log(&format!(
            "Resolved context '{}' (cluster '{}', user '{}') to {} with {} authentication",
            context.name,
            cluster.name,
            user.name,
            options.endpoint,
            options.auth_strategy.kind()
        ));

        options.ensure_valid()?;
        Ok(options)
    }

    /// Exactly one strategy is built: client certificate, then static token,
    /// then basic, then auth-provider, then exec, then none.
    fn build_strategy(
        &self,
        user: &UserConfig,
        cluster: &ClusterConfig,
        authority: Option<&ClusterAuthority>,
        base_dir: Option<&Path>,
    ) -> Result<AuthStrategy> {
        if user.has_client_certificate() {
            let certificate_path;
            let certificate_source = match (&user.client_certificate_data, &user.client_certificate) {
                (data, _) if is_set(data) => MaterialSource::InlineBase64(data.as_deref().unwrap_or_default()),
                (_, path) => {
                    certificate_path = resolve_path(path.as_deref().unwrap_or_default(), base_dir);
                    MaterialSource::File(&certificate_path)
                }
            };

            let key_path;
            let key_source = if is_set(&user.client_key_data) {
                Some(MaterialSource::InlineBase64(
                    user.client_key_data.as_deref().unwrap_or_default(),
                ))
            } else if is_set(&user.client_key) {
                key_path = resolve_path(user.client_key.as_deref().unwrap_or_default(), base_dir);
                Some(MaterialSource::File(&key_path))
            } else {
                None
            };

            let certificate = load_client_certificate(&certificate_source, key_source.as_ref())?;
            return Ok(AuthStrategy::ClientCertificate(certificate));
        }

        if user.has_client_key() {
            return Err(KubeError::InvalidAuthConfiguration(
                "a client key is configured without a client certificate".to_string(),
            ));
        }

        if is_set(&user.token) {
            return Ok(AuthStrategy::BearerToken {
                token: user.token.as_deref().unwrap_or_default().trim().to_string(),
            });
        }

        if let Some(token_file) = user.token_file.as_deref().filter(|f| !f.trim().is_empty()) {
            let path = resolve_path(token_file, base_dir);
            let token = fs::read_to_string(&path).map_err(|e| {
                KubeError::InvalidAuthConfiguration(format!(
                    "cannot read token file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            return Ok(AuthStrategy::BearerToken {
                token: token.trim().to_string(),
            });
        }

        if is_set(&user.username) && is_set(&user.password) {
            return Ok(AuthStrategy::Basic {
                username: user.username.clone().unwrap_or_default(),
                password: user.password.clone().unwrap_or_default(),
            });
        }

        if let Some(provider) = &user.auth_provider {
            let command = AuthProviderCommand::from_config(provider)?;
            let initial = command.initial_credential();
            return Ok(AuthStrategy::TokenProvider(RefreshableCredential::new(
                command,
                initial,
                Arc::clone(&self.runner),
                Arc::clone(&self.logger),
                self.settings.refresh_margin()?,
            )));
        }

        if let Some(exec) = &user.exec {
            let plugin = exec_plugin(exec, cluster, authority);
            return Ok(AuthStrategy::CredentialPlugin(RefreshableCredential::new(
                plugin,
                None,
                Arc::clone(&self.runner),
                Arc::clone(&self.logger),
                self.settings.refresh_margin()?,
            )));
        }

        Ok(AuthStrategy::None)
    }
}

/// Resolves with default [`ClientSettings`] and a process-spawning runner.
pub fn resolve(
    config: &KubeConfig,
    context_name: Option<&str>,
    namespace: Option<&str>,
) -> Result<ConnectionOptions> {
    Resolver::new(ClientSettings::default()).resolve(config, context_name, namespace)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_endpoint(server: &str) -> Result<Url> {
    let server = server.trim();
    if server.is_empty() {
        return Err(KubeError::InvalidEndpoint {
            endpoint: String::new(),
            reason: "the cluster has no server configured".to_string(),
        });
    }
    Url::parse(server).map_err(|e| KubeError::InvalidEndpoint {
        endpoint: server.to_string(),
        reason: e.to_string(),
    })
}

fn load_cluster_authority(
    cluster: &ClusterConfig,
    base_dir: Option<&Path>,
) -> Result<Option<ClusterAuthority>> {
    if let Some(data) = cluster.certificate_authority_data.as_deref().filter(|d| !d.trim().is_empty()) {
        let certificate = load_certificate(&MaterialSource::InlineBase64(data))?;
        let data = data.chars().filter(|c| !c.is_whitespace()).collect();
        return Ok(Some(ClusterAuthority { certificate, data }));
    }

    if let Some(path) = cluster.certificate_authority.as_deref().filter(|p| !p.trim().is_empty()) {
        let path = resolve_path(path, base_dir);
        let certificate = load_certificate(&MaterialSource::File(&path))?;
        let pem = certificate
            .to_pem()
            .map_err(|e| KubeError::certificate_load(path.display().to_string(), e))?;
        return Ok(Some(ClusterAuthority {
            certificate,
            data: general_purpose::STANDARD.encode(pem),
        }));
    }

    Ok(None)
}

fn exec_plugin(
    exec: &ExecConfig,
    cluster: &ClusterConfig,
    authority: Option<&ClusterAuthority>,
) -> ExecPlugin {
    let cluster_info = exec.provide_cluster_info.then(|| ExecClusterInfo {
        server: cluster.server.trim().to_string(),
        certificate_authority_data: authority.map(|authority| authority.data.clone()),
        insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
    });

    ExecPlugin {
        api_version: exec.api_version.clone().unwrap_or_default(),
        command: exec.command.clone(),
        args: exec.args.clone(),
        env: exec
            .env
            .iter()
            .map(|var| (var.name.clone(), var.value.clone()))
            .collect(),
        install_hint: exec.install_hint.clone(),
        cluster: cluster_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CommandError, CommandInvocation, CommandOutput, CredentialSecret};
    use crate::cert::testing::{generate_ca, generate_leaf, pem_base64};
    use crate::transport::HttpRequestContext;
    use crate::utils::MemoryLogger;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const EXEC_OUTPUT: &str = r#"{"apiVersion":"client.authentication.k8s.io/v1","kind":"ExecCredential","status":{"token":"xyz","expirationTimestamp":"2099-01-01T00:00:00Z"}}"#;

    struct FakeRunner {
        stdout: String,
        calls: AtomicUsize,
        last: Mutex<Option<CommandInvocation>>,
    }

    impl FakeRunner {
        fn new(stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                stdout: stdout.to_string(),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(
            &self,
            invocation: &CommandInvocation,
        ) -> std::result::Result<CommandOutput, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(invocation.clone());
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }

    fn ca_data() -> String {
        let (ca, _) = generate_ca("cluster-ca");
        pem_base64(&ca.to_pem().unwrap())
    }

    fn document(user: &str) -> KubeConfig {
        let yaml = format!(
            r#"
apiVersion: v1
kind: Config
current-context: dev
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: dev-user
- name: staging
  context:
    cluster: dev-cluster
    user: dev-user
    namespace: staging
- name: orphan-cluster
  context:
    cluster: missing
    user: dev-user
- name: orphan-user
  context:
    cluster: dev-cluster
    user: missing
clusters:
- name: dev-cluster
  cluster:
    server: https://10.0.0.1:6443
    certificate-authority-data: {}
users:
- name: dev-user
  user:
{}
"#,
            ca_data(),
            user
        );
        KubeConfig::from_yaml_str(&yaml).unwrap()
    }

    #[tokio::test]
    async fn resolves_static_token_and_applies_bearer_header() {
        let options = resolve(&document("    token: abc123"), Some("dev"), None).unwrap();

        assert_eq!(options.endpoint.as_str(), "https://10.0.0.1:6443/");
        assert!(options.ca_certificate.is_some());
        assert!(matches!(
            &options.auth_strategy,
            AuthStrategy::BearerToken { token } if token == "abc123"
        ));

        let mut request = HttpRequestContext::new();
        options
            .auth_strategy
            .apply(&mut request, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            request.headers.get("authorization"),
            Some("Bearer abc123")
        );
    }

    #[test]
    fn empty_context_name_falls_back_to_current_context() {
        let options = resolve(&document("    token: abc123"), Some("  "), None).unwrap();
        assert_eq!(options.namespace, "default");
    }

    #[test]
    fn context_names_are_matched_exactly() {
        assert!(matches!(
            resolve(&document("    token: abc123"), Some(" dev "), None),
            Err(KubeError::ContextNotFound(name)) if name == " dev "
        ));
    }

    #[test]
    fn invalid_settings_are_rejected_before_resolving() {
        let settings = ClientSettings {
            refresh_margin_secs: 100_000_000_000_000_000,
            ..ClientSettings::default()
        };
        let result = Resolver::new(settings).resolve(
            &document("    exec:\n      apiVersion: client.authentication.k8s.io/v1\n      command: get-token"),
            Some("dev"),
            None,
        );
        assert!(matches!(result, Err(KubeError::InvalidOptions(_))));
    }

    #[test]
    fn missing_current_context_is_reported() {
        let mut config = document("    token: abc123");
        config.current_context = None;
        assert!(matches!(
            resolve(&config, None, None),
            Err(KubeError::NoContextSpecified)
        ));
    }

    #[test]
    fn missing_names_are_reported_not_defaulted() {
        let config = document("    token: abc123");
        assert!(matches!(
            resolve(&config, Some("prod"), None),
            Err(KubeError::ContextNotFound(name)) if name == "prod"
        ));
        assert!(matches!(
            resolve(&config, Some("orphan-cluster"), None),
            Err(KubeError::ClusterNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            resolve(&config, Some("orphan-user"), None),
            Err(KubeError::UserNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn namespace_precedence() {
        let config = document("    token: abc123");
        let settings = ClientSettings {
            default_namespace: "fallback".to_string(),
            ..ClientSettings::default()
        };
        let resolver = Resolver::new(settings);

        assert_eq!(resolver.resolve(&config, Some("dev"), None).unwrap().namespace, "fallback");
        assert_eq!(
            resolver.resolve(&config, Some("staging"), None).unwrap().namespace,
            "staging"
        );
        assert_eq!(
            resolver
                .resolve(&config, Some("staging"), Some("explicit"))
                .unwrap()
                .namespace,
            "explicit"
        );
    }

    #[test]
    fn client_certificate_wins_over_token() {
        let (ca, ca_key) = generate_ca("users-ca");
        let (leaf, key) = generate_leaf("admin", &ca, &ca_key);
        let user = format!(
            "    token: abc123\n    client-certificate-data: {}\n    client-key-data: {}",
            pem_base64(&leaf.to_pem().unwrap()),
            pem_base64(&key.private_key_to_pem_pkcs8().unwrap())
        );

        let options = resolve(&document(&user), None, None).unwrap();
        assert!(matches!(options.auth_strategy, AuthStrategy::ClientCertificate(_)));
        assert!(options.client_certificate.is_some());
    }

    #[test]
    fn token_wins_over_basic_and_basic_over_provider() {
        let token_and_basic = "    token: abc123\n    username: admin\n    password: secret";
        let options = resolve(&document(token_and_basic), None, None).unwrap();
        assert_eq!(options.auth_strategy.kind(), "bearer-token");

        let basic_and_provider = "    username: admin\n    password: secret\n    auth-provider:\n      name: gcp\n      config:\n        access-token: seed";
        let options = resolve(&document(basic_and_provider), None, None).unwrap();
        assert_eq!(options.auth_strategy.kind(), "basic");
    }

    #[test]
    fn provider_wins_over_exec() {
        let user = r#"    auth-provider:
      name: gcp
      config:
        cmd-path: gcloud
    exec:
      apiVersion: client.authentication.k8s.io/v1
      command: get-token"#;
        let options = resolve(&document(user), None, None).unwrap();
        assert_eq!(options.auth_strategy.kind(), "auth-provider");
    }

    #[test]
    fn no_credentials_resolve_to_none() {
        let options = resolve(&document("    {}"), None, None).unwrap();
        assert_eq!(options.auth_strategy.kind(), "none");
    }

    #[test]
    fn certificate_without_key_fails_validation() {
        let (ca, ca_key) = generate_ca("users-ca");
        let (leaf, _) = generate_leaf("admin", &ca, &ca_key);
        let user = format!(
            "    client-certificate-data: {}",
            pem_base64(&leaf.to_pem().unwrap())
        );
        assert!(matches!(
            resolve(&document(&user), None, None),
            Err(KubeError::CertificateLoadFailure { .. })
        ));
    }

    #[test]
    fn key_without_certificate_is_invalid() {
        let user = "    client-key-data: Zm9v";
        assert!(matches!(
            resolve(&document(user), None, None),
            Err(KubeError::InvalidAuthConfiguration(_))
        ));
    }

    #[test]
    fn exec_without_api_version_is_invalid() {
        let user = "    exec:\n      command: get-token";
        assert!(matches!(
            resolve(&document(user), None, None),
            Err(KubeError::InvalidAuthConfiguration(_))
        ));
    }

    #[test]
    fn unreadable_ca_file_is_certificate_load_failure() {
        let config = KubeConfig::from_yaml_str(
            r#"
current-context: dev
contexts:
- name: dev
  context: {cluster: c, user: u}
clusters:
- name: c
  cluster:
    server: https://10.0.0.1:6443
    certificate-authority: /nonexistent/ca.crt
users:
- name: u
  user: {}
"#,
        )
        .unwrap();
        assert!(matches!(
            resolve(&config, None, None),
            Err(KubeError::CertificateLoadFailure { .. })
        ));
    }

    #[test]
    fn relative_paths_resolve_against_kubeconfig_directory() {
        let temp_dir = TempDir::new().unwrap();
        let (ca, _) = generate_ca("file-ca");
        fs::create_dir_all(temp_dir.path().join("pki")).unwrap();
        fs::write(temp_dir.path().join("pki/ca.crt"), ca.to_pem().unwrap()).unwrap();
        fs::write(temp_dir.path().join("token"), "file-token\n").unwrap();
        fs::write(
            temp_dir.path().join("config"),
            r#"
current-context: dev
contexts:
- name: dev
  context: {cluster: c, user: u}
clusters:
- name: c
  cluster:
    server: https://kube.example.com
    certificate-authority: pki/ca.crt
users:
- name: u
  user:
    tokenFile: token
"#,
        )
        .unwrap();

        let config = KubeConfig::load_from_file(temp_dir.path().join("config")).unwrap();
        let options = resolve(&config, None, None).unwrap();

        assert!(options.ca_certificate.is_some());
        assert!(matches!(
            &options.auth_strategy,
            AuthStrategy::BearerToken { token } if token == "file-token"
        ));
    }

    #[test]
    fn invalid_server_is_reported() {
        let config = KubeConfig::from_yaml_str(
            "current-context: dev\ncontexts:\n- name: dev\n  context: {cluster: c, user: u}\nclusters:\n- name: c\n  cluster: {server: 'not a url'}\nusers:\n- name: u\n  user: {}\n",
        )
        .unwrap();
        assert!(matches!(
            resolve(&config, None, None),
            Err(KubeError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn exec_plugin_credential_is_cached_after_first_call() {
        let runner = FakeRunner::new(EXEC_OUTPUT);
        let user = r#"    exec:
      apiVersion: client.authentication.k8s.io/v1
      command: get-token
      args: ["--format", "json"]
      provideClusterInfo: true"#;
        let logger = Arc::new(MemoryLogger::new());
        let resolver = Resolver::new(ClientSettings::default())
            .with_runner(runner.clone())
            .with_logger(logger.clone());
        let options = resolver.resolve(&document(user), None, None).unwrap();

        let now = Utc::now();
        let first = options.auth_strategy.resolve_credential(now).await.unwrap().unwrap();
        let second = options.auth_strategy.resolve_credential(now).await.unwrap().unwrap();

        assert_eq!(first.token(), Some("xyz"));
        assert_eq!(
            first.expires_at,
            Some(Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(matches!(second.secret, CredentialSecret::BearerToken(ref t) if t == "xyz"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        let invocation = runner.last.lock().unwrap().clone().unwrap();
        assert_eq!(invocation.args, vec!["--format", "json"]);
        let info = &invocation.env[crate::auth::EXEC_INFO_ENV];
        assert!(info.contains("https://10.0.0.1:6443"));
        assert!(info.contains("certificate-authority-data"));

        assert!(logger
            .entries()
            .iter()
            .any(|entry| entry.contains("exec-plugin authentication")));
    }
}
