// src/kubeconfig/mod.rs
mod loader;
mod model;
mod pod;
mod resolver;

pub use loader::locate;
pub use model::{
    AuthProviderConfig, ClusterConfig, ContextConfig, ExecConfig, ExecEnvVar, KubeConfig,
    NamedCluster, NamedContext, NamedUser, UserConfig,
};
pub use pod::{PodEnvironment, DEFAULT_SERVICE_ACCOUNT_PATH, SERVICE_HOST_ENV, SERVICE_PORT_ENV};
pub use resolver::{resolve, Resolver};
